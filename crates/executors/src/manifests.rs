use k8s_openapi::{
    api::core::v1::{ConfigMap, Secret},
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference},
};

use crate::request::ConfigSecretMap;

fn owned_meta(name: &str, owner: OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        owner_references: Some(vec![owner]),
        ..Default::default()
    }
}

pub fn config_map_body(cm: &ConfigSecretMap, owner: OwnerReference) -> ConfigMap {
    ConfigMap {
        metadata: owned_meta(&cm.name, owner),
        data: Some(cm.data.clone()),
        ..Default::default()
    }
}

/// Secret values are plain text; the API server encodes `stringData`.
pub fn secret_body(secret: &ConfigSecretMap, owner: OwnerReference) -> Secret {
    Secret {
        metadata: owned_meta(&secret.name, owner),
        string_data: Some(secret.data.clone()),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}
