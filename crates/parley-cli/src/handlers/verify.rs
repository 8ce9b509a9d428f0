//! Verify command handler: probe which client identities the gateway accepts.

use anyhow::Result;

use parley_core::GatewayError;
use parley_gateway::{GatewayClient, GatewayConfig};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// An alternative identity to try after the configured one.
struct Identity {
    label: &'static str,
    role: &'static str,
    client_id: &'static str,
    mode: &'static str,
    scopes: &'static [&'static str],
}

const ALTERNATES: &[Identity] = &[
    Identity {
        label: "operator via cli",
        role: "operator",
        client_id: "cli",
        mode: "cli",
        scopes: &["operator.read", "operator.write"],
    },
    Identity {
        label: "read-only operator",
        role: "operator",
        client_id: "gateway-client",
        mode: "backend",
        scopes: &["operator.read"],
    },
    Identity {
        label: "node",
        role: "node",
        client_id: "node-host",
        mode: "node",
        scopes: &[],
    },
];

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let base = GatewayConfig::from_settings(&ctx.settings.gateway);
    println!("Verifying {}", base.url);

    let mut candidates = vec![(
        format!("configured ({} as {})", base.connect.client.id, base.connect.role),
        base.clone(),
    )];
    candidates.extend(ALTERNATES.iter().map(|identity| {
        let config = base.clone().with_identity(
            identity.role,
            identity.client_id,
            identity.mode,
            identity.scopes,
        );
        (identity.label.to_string(), config)
    }));

    let mut accepted = 0usize;
    for (label, config) in candidates {
        match probe(config).await {
            Ok(()) => {
                accepted += 1;
                println!("  ✓ {label}");
            }
            Err(e) => println!("  ✗ {label}: {e}"),
        }
    }

    println!();
    if accepted == 0 {
        return Err(CliError::from(GatewayError::Auth(
            "no client identity was accepted".to_string(),
        ))
        .into());
    }
    println!("{accepted} identity(ies) accepted");
    Ok(())
}

async fn probe(config: GatewayConfig) -> Result<(), GatewayError> {
    let client = GatewayClient::websocket(config);
    let outcome = client.connect().await;
    client.close();
    outcome
}
