//! Network dashboard and per-node reporting agents.
//!
//! The dashboard runs once, inside the service container on the first host.
//! Each node gets a reporting agent whose `app.json` is patched in place with
//! its instance name, the dashboard endpoint and its own RPC host. Failures
//! are reported like any other task error and fail the build at the final
//! barrier.

use tracing::{debug, info};

use super::phase::{complete, FanOut};
use super::BuildContext;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::infrastructure::tmux::{shell_escape, TmuxCommandBuilder};
use crate::types::fleet::{Fleet, HostConfig, NodeRef};

/// Tmux session the reporting agent runs in.
pub const AGENT_SESSION: &str = "ethnet";

pub struct StatsRegistrar {
    ctx: BuildContext,
}

impl StatsRegistrar {
    pub fn new(ctx: BuildContext) -> Self {
        StatsRegistrar { ctx }
    }

    /// Start the dashboard, then register every node with it.
    pub async fn register(&self, fleet: &Fleet) -> Result<(), DeployError> {
        self.start_dashboard(fleet).await;

        let mut fan = FanOut::new(&self.ctx.limiter, &self.ctx.state);
        for node in fleet.nodes() {
            let ctx = self.ctx.clone();
            let host = fleet.host(node.host).clone();
            fan.spawn(node.index, start_agent(ctx, host, node)).await?;
        }
        let slots = fan.join().await?;
        self.ctx.state.checkpoint()?;
        complete(slots).map(|_| ())
    }

    /// A dashboard failure is recorded, not returned; agents are still set up.
    async fn start_dashboard(&self, fleet: &Fleet) {
        let Some(host) = fleet.hosts().first() else {
            return;
        };
        match self.ctx.executor.run(host, &dashboard_command(&self.ctx.config)).await {
            Ok(_) => {
                info!(host = %host.addr, port = self.ctx.config.stats.port, "dashboard started");
                self.ctx.state.increment_progress();
            }
            Err(e) => self.ctx.state.report_error(None, format!("dashboard: {}", e)),
        }
    }
}

async fn start_agent(ctx: BuildContext, host: HostConfig, node: NodeRef) -> Result<(), DeployError> {
    let tmux = TmuxCommandBuilder::new();
    let config = &ctx.config;
    ctx.executor
        .exec_detached(&host, node.slot, &tmux.new_session(AGENT_SESSION))
        .await?;
    for cmd in agent_patches(config, &host, &node) {
        ctx.executor.exec(&host, node.slot, &cmd).await?;
    }
    let start = format!("cd {} && pm2 start app.json", config.stats.agent_dir);
    ctx.executor
        .exec_detached(&host, node.slot, &tmux.send_keys(AGENT_SESSION, &start))
        .await?;
    ctx.state.increment_progress();
    debug!(node = node.index, "reporting agent started");
    Ok(())
}

/// `docker exec -d <service> bash -c 'cd <dir> && WS_SECRET=<pw> PORT=<port> npm start'`
pub fn dashboard_command(config: &DeployConfig) -> String {
    let inner = format!(
        "cd {} && WS_SECRET={} PORT={} npm start",
        config.stats.dashboard_dir,
        shell_escape(&config.password),
        config.stats.port
    );
    format!(
        "docker exec -d {} bash -c {}",
        config.service_container,
        shell_escape(&inner)
    )
}

/// The three in-place edits of the agent's `app.json` for one node.
pub fn agent_patches(config: &DeployConfig, host: &HostConfig, node: &NodeRef) -> Vec<String> {
    let app = format!("{}/app.json", config.stats.agent_dir.trim_end_matches('/'));
    vec![
        set_field(&app, "INSTANCE_NAME", &format!("{}{}", config.node_prefix, node.index)),
        set_field(
            &app,
            "WS_SERVER",
            &format!("http://{}:{}", host.gateway, config.stats.port),
        ),
        set_field(&app, "RPC_HOST", &node.ip),
    ]
}

/// `sed` replacing the string value of `field` in a JSON file. The value is
/// literal in the replacement and the program is quoted for the shell.
fn set_field(file: &str, field: &str, value: &str) -> String {
    let value = sed_replacement(value);
    let program = format!(r#"s/"{field}"(\s)*:(\s)*"(\S)*"/"{field}"\t: "{value}"/g"#);
    format!("sed -i -r {} {}", shell_escape(&program), file)
}

/// Escape the characters special in a `s///` replacement.
fn sed_replacement(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '&' | '/') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
