//! Genesis document construction.
//!
//! The allocation funds every node wallet plus a number of synthetic
//! accounts. Synthetic addresses are `0x` followed by `i` in upper-case hex,
//! zero-padded to 40 digits, for `i = 1..=n`; they are reproducible and never
//! collide with each other.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::artifact::{LocalArtifact, GENESIS_FILE};
use crate::error::DeployError;
use crate::template::{MustacheRenderer, TemplateRenderer};
use crate::types::deployment::{DeploymentSpec, NetworkParams};

/// Name of the deployment file entry that overrides the base template. The
/// override may only use variable tags.
pub const TEMPLATE_FILE: &str = "genesis.json";

/// Base template used when the deployment names none.
pub const DEFAULT_TEMPLATE: &str = r#"{
  "config": {
    "chainId": {{chainId}},
    "homesteadBlock": {{homesteadBlock}},
    "eip155Block": {{eip155Block}},
    "eip158Block": {{eip158Block}}
  },
  "nonce": "0x0000000000000042",
  "timestamp": "0x00",
  "extraData": "0x00",
  "difficulty": "{{difficulty}}",
  "gasLimit": "{{gasLimit}}",
  "alloc": {{{alloc}}}
}
"#;


// ---------------------------------------------------------------------------
// GenesisDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub balance: String,
}

/// Network parameters plus the funded allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisDocument {
    pub chain_id: u64,
    pub homestead_block: u64,
    pub eip155_block: u64,
    pub eip158_block: u64,
    pub difficulty: String,
    pub gas_limit: String,
    pub alloc: BTreeMap<String, Allocation>,
}

impl GenesisDocument {
    /// Fund every address in `wallets` and `params.extra_accounts` synthetic
    /// accounts with the initial balance. An address may appear only once.
    pub fn build(params: &NetworkParams, wallets: &[String]) -> Result<Self, DeployError> {
        let mut alloc = BTreeMap::new();
        for address in wallets.iter().cloned().chain(synthetic_accounts(params.extra_accounts)) {
            let entry = Allocation {
                balance: params.init_balance.clone(),
            };
            if alloc.insert(address.clone(), entry).is_some() {
                return Err(DeployError::DuplicateAllocation(address));
            }
        }
        Ok(GenesisDocument {
            chain_id: params.network_id,
            homestead_block: params.homestead_block,
            eip155_block: params.eip155_block,
            eip158_block: params.eip158_block,
            difficulty: hex_quantity(params.difficulty),
            gas_limit: hex_quantity(params.gas_limit),
            alloc,
        })
    }

    /// Values handed to the template renderer, keyed by field name.
    pub fn template_values(&self) -> Result<Map<String, Value>, DeployError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(DeployError::ConfigInvalid(
                "genesis document did not serialize to an object".into(),
            )),
            Err(source) => Err(DeployError::Encode {
                what: "genesis document",
                source,
            }),
        }
    }
}

/// `n` deterministic synthetic addresses, starting at 1.
pub fn synthetic_accounts(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("0x{:040X}", i)).collect()
}

/// `0x0<UPPER HEX>`, the quantity format the base template expects.
pub fn hex_quantity(value: u64) -> String {
    format!("0x0{:X}", value)
}


// ---------------------------------------------------------------------------
// GenesisBuilder
// ---------------------------------------------------------------------------

/// Renders the genesis document through a `TemplateRenderer`.
pub struct GenesisBuilder {
    renderer: Arc<dyn TemplateRenderer>,
}

impl Default for GenesisBuilder {
    fn default() -> Self {
        Self::new(Arc::new(MustacheRenderer))
    }
}

impl GenesisBuilder {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        GenesisBuilder { renderer }
    }

    /// Base template for `spec`: its `genesis.json` file, else the default.
    pub fn template(&self, spec: &DeploymentSpec) -> Result<String, DeployError> {
        Ok(spec
            .read_file(TEMPLATE_FILE)?
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()))
    }

    /// Render the genesis document for `wallets` without touching disk.
    pub fn render(
        &self,
        spec: &DeploymentSpec,
        wallets: &[String],
    ) -> Result<(GenesisDocument, String), DeployError> {
        let document = GenesisDocument::build(&spec.params, wallets)?;
        let template = self.template(spec)?;
        let rendered = self.renderer.render(&template, &document.template_values()?)?;
        Ok((document, rendered))
    }

    /// Render and write `CustomGenesis.json` into `dir`.
    pub fn write(
        &self,
        spec: &DeploymentSpec,
        wallets: &[String],
        dir: &Path,
    ) -> Result<(GenesisDocument, LocalArtifact), DeployError> {
        let (document, rendered) = self.render(spec, wallets)?;
        let artifact = LocalArtifact::write(dir, GENESIS_FILE, &rendered)?;
        debug!(accounts = document.alloc.len(), "genesis rendered");
        Ok((document, artifact))
    }
}
