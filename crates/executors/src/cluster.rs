use kube::{Client, Config};
use secrecy::SecretString;

use crate::{error::WorkflowError, request::ClusterTarget, template::ClusterRouting};

/// Rest config for a target cluster reached with a bearer token. TLS
/// verification is skipped for these clusters.
pub fn external_config(target: &ClusterTarget) -> Result<Config, WorkflowError> {
    let uri: http::Uri = target.server_url.parse().map_err(|err| {
        WorkflowError::InvalidClusterConfig(format!(
            "cluster {} has invalid server url {}: {err}",
            target.cluster_name, target.server_url
        ))
    })?;
    let mut config = Config::new(uri);
    config.accept_invalid_certs = true;
    config.auth_info.token = Some(SecretString::from(target.bearer_token.clone()));
    Ok(config)
}

pub async fn client_for(routing: &ClusterRouting) -> Result<Client, WorkflowError> {
    let config = match routing {
        ClusterRouting::InCluster => Config::incluster()
            .map_err(|err| WorkflowError::InvalidClusterConfig(err.to_string()))?,
        ClusterRouting::External(target) => external_config(target)?,
    };
    Ok(Client::try_from(config)?)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn external_config_uses_bearer_token_and_skips_tls() {
        let target = ClusterTarget {
            cluster_id: 2,
            cluster_name: "prod".to_string(),
            server_url: "https://10.0.0.1:6443".to_string(),
            bearer_token: "token".to_string(),
        };
        let config = external_config(&target).unwrap();
        assert!(config.accept_invalid_certs);
        assert_eq!(config.cluster_url.host(), Some("10.0.0.1"));
        assert_eq!(
            config.auth_info.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("token".to_string())
        );
    }

    #[test]
    fn external_config_rejects_bad_url() {
        let target = ClusterTarget {
            server_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            external_config(&target),
            Err(WorkflowError::InvalidClusterConfig(_))
        ));
    }
}
