use crate::profiles::ProfilesFile;
use colored::Colorize;
use fga_acl::grpc::check_health;
use fga_acl::{AclError, ConnectionProfile, FgaBackend, GrpcBackend};

/// Health status name reported by a server that is ready for queries.
pub const SERVING: &str = "SERVING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Ok(String),
    Warning(String),
    Error(String),
}

/// Run connection diagnostics for the `connection` profile.
///
/// Checks, in order:
/// 1. profile file location (Warning when none was found)
/// 2. profile resolution and endpoint (Error if unusable)
/// 3. TLS setting
/// 4. gRPC health service status (Error unless `SERVING`)
/// 5. store and authorization model resolution against the server (Error if it fails)
///
/// Results are printed with colored indicators. Always returns `Ok(())`.
pub async fn run(
    profiles: &ProfilesFile,
    connection: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        format!("fga-acl doctor: checking connection '{}'", connection).bold()
    );
    println!();

    let profile = profiles.profile(connection);
    let remote = match &profile {
        Ok(profile) => Some(Remote {
            health: check_health(&profile.config).await,
            connected: GrpcBackend::connect(&profile.config).await,
        }),
        Err(_) => None,
    };

    let mut issues = 0;
    for (name, result) in checks(profiles, &profile, remote.as_ref()) {
        report(name, &result, &mut issues);
    }

    println!();
    if issues == 0 {
        println!("{}", "All checks passed!".green().bold());
    } else {
        println!("{}", format!("{} issue(s) found", issues).yellow().bold());
    }

    Ok(())
}

/// What the server answered, once a profile resolved.
pub struct Remote {
    pub health: Result<String, AclError>,
    pub connected: Result<GrpcBackend, AclError>,
}

/// Evaluate every check. `remote` is absent when no profile could be resolved.
pub fn checks(
    profiles: &ProfilesFile,
    profile: &Result<ConnectionProfile, AclError>,
    remote: Option<&Remote>,
) -> Vec<(&'static str, CheckResult)> {
    let mut results = Vec::new();

    results.push((
        "Profile file",
        match &profiles.source {
            Some(path) => CheckResult::Ok(format!(
                "{} ({} connection(s))",
                path.display(),
                profiles.connections.len()
            )),
            None => CheckResult::Warning("no profile file, using environment only".into()),
        },
    ));

    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            results.push(("Connection profile", CheckResult::Error(e.to_string())));
            return results;
        }
    };
    results.push((
        "Connection profile",
        match profile.config.endpoint_uri() {
            Ok(uri) => CheckResult::Ok(uri),
            Err(e) => CheckResult::Error(e.to_string()),
        },
    ));

    results.push((
        "TLS",
        if profile.config.tls_enabled() {
            CheckResult::Ok("enabled".into())
        } else {
            CheckResult::Ok("disabled".into())
        },
    ));

    if let Some(remote) = remote {
        results.push((
            "Health",
            match &remote.health {
                Ok(status) if status == SERVING => CheckResult::Ok(status.clone()),
                Ok(status) => CheckResult::Error(status.clone()),
                Err(e) => CheckResult::Error(e.to_string()),
            },
        ));
        results.push((
            "Store and model",
            match &remote.connected {
                Ok(backend) => CheckResult::Ok(format!(
                    "store {} / model {}",
                    backend.store_id(),
                    backend.model_id().unwrap_or("latest")
                )),
                Err(e) => CheckResult::Error(e.to_string()),
            },
        ));
    }

    results
}

fn report(name: &str, result: &CheckResult, issues: &mut usize) {
    match result {
        CheckResult::Ok(msg) => {
            println!("  {} {}: {}", "✓".green(), name, msg.dimmed());
        }
        CheckResult::Warning(msg) => {
            println!("  {} {}: {}", "!".yellow(), name, msg.yellow());
            *issues += 1;
        }
        CheckResult::Error(msg) => {
            println!("  {} {}: {}", "x".red(), name, msg.red());
            *issues += 1;
        }
    }
}
