//! # Wallet Subcommand
//!
//! Shows which pool identity an organization identifier maps to under the
//! configured `wallet` section, without onboarding anything.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use prov_core::OrgId;
use prov_crypto::{WalletAssigner, WalletConfig};

/// Arguments for the `prov wallet` subcommand.
#[derive(Args, Debug)]
pub struct WalletArgs {
    #[command(subcommand)]
    pub command: WalletCommand,
}

/// Wallet subcommands.
#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Print the identity each organization would be assigned.
    Assign {
        /// Organization identifiers.
        #[arg(value_name = "ORG_ID", required = true)]
        org_ids: Vec<String>,
    },

    /// Print the pool, marking reserved entries.
    List,
}

/// Execute the wallet subcommand.
pub fn run_wallet(args: &WalletArgs, config: &WalletConfig) -> Result<u8> {
    let assigner = WalletAssigner::new(config).context("invalid wallet configuration")?;
    match &args.command {
        WalletCommand::Assign { org_ids } => {
            for line in assignments(&assigner, org_ids)? {
                println!("{line}");
            }
        }
        WalletCommand::List => {
            for line in pool_listing(&assigner) {
                println!("{line}");
            }
        }
    }
    Ok(0)
}

fn assignments(assigner: &WalletAssigner, org_ids: &[String]) -> Result<Vec<String>> {
    org_ids
        .iter()
        .map(|raw| {
            let org = OrgId::new(raw).with_context(|| format!("invalid organization id {raw:?}"))?;
            Ok(format!(
                "{org} -> {} (index {})",
                assigner.assign(&org),
                assigner.index_for(&org)
            ))
        })
        .collect()
}

fn pool_listing(assigner: &WalletAssigner) -> Vec<String> {
    (0..assigner.pool_size())
        .filter_map(|i| {
            let address = assigner.address(i)?;
            let marker = if i < assigner.reserved() { " (reserved)" } else { "" };
            Some(format!("{i:>4}  {address}{marker}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_stable() {
        let assigner = WalletAssigner::new(&WalletConfig::default()).unwrap();
        let ids = vec!["mfr-1".to_string(), "dist-1".to_string()];
        let first = assignments(&assigner, &ids).unwrap();
        let second = assignments(&assigner, &ids).unwrap();
        assert_eq!(first, second);
        assert!(first[0].starts_with("mfr-1 -> "));
    }

    #[test]
    fn invalid_org_id_is_reported() {
        let assigner = WalletAssigner::new(&WalletConfig::default()).unwrap();
        let err = assignments(&assigner, &["bad id!".to_string()]).unwrap_err();
        assert!(err.to_string().contains("invalid organization id"));
    }

    #[test]
    fn listing_marks_reserved_entries() {
        let config = WalletConfig::default();
        let assigner = WalletAssigner::new(&config).unwrap();
        let lines = pool_listing(&assigner);
        assert_eq!(lines.len(), assigner.pool_size());
        let reserved = lines.iter().filter(|l| l.ends_with("(reserved)")).count();
        assert_eq!(reserved, assigner.reserved());
    }
}
