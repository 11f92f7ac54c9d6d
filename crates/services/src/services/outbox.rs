use std::{sync::Arc, time::Duration};

use db::{
    DBService,
    entities::event_outbox,
    events::{
        EVENT_MATERIAL_UPDATED, EVENT_MATERIALS_REGISTERED, EVENT_PIPELINE_MATERIALS_SAVED,
        MaterialUpdatedPayload, MaterialsRegisteredPayload, PipelineMaterialsSavedPayload,
    },
    models::{
        ci_pipeline::CiPipelineMaterial, event_outbox::EventOutbox, git_material::GitMaterial,
    },
};

use super::{
    clients::{GitSensorClient, SensorMaterial, SensorPipelineMaterial},
    error::{PipelineError, Result},
};

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(250);
const OUTBOX_BATCH_LIMIT: u64 = 100;

/// Drains `event_outbox` rows into the git sensor. Rows are written in the
/// same transaction as the mutation that caused them, so a sensor outage
/// only delays registration.
#[derive(Clone)]
pub struct OutboxWorker {
    db: DBService,
    sensor: Arc<dyn GitSensorClient>,
}

impl OutboxWorker {
    pub fn new(db: DBService, sensor: Arc<dyn GitSensorClient>) -> Self {
        Self { db, sensor }
    }

    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            worker.run_outbox_loop().await;
        })
    }

    pub async fn run_outbox_loop(&self) {
        loop {
            if let Err(err) = self.flush_pending().await {
                tracing::error!(error = %err, "material outbox flush failed");
            }
            tokio::time::sleep(OUTBOX_POLL_INTERVAL).await;
        }
    }

    /// Dispatches one batch. Returns how many entries were published.
    pub async fn flush_pending(&self) -> Result<usize> {
        let entries = EventOutbox::fetch_unpublished(&self.db.pool, OUTBOX_BATCH_LIMIT).await?;
        let mut published = 0;

        for entry in entries {
            match self.dispatch_entry(&entry).await {
                Ok(()) => {
                    EventOutbox::mark_published(&self.db.pool, entry.id).await?;
                    published += 1;
                }
                Err(err) => {
                    let err_msg = err.to_string();
                    tracing::warn!(
                        event_id = entry.uuid.to_string(),
                        event_type = %entry.event_type,
                        entity_id = entry.entity_id,
                        error = %err_msg,
                        "material event dispatch failed"
                    );
                    EventOutbox::record_failure(&self.db.pool, entry.id, &err_msg).await?;
                }
            }
        }

        Ok(published)
    }

    async fn dispatch_entry(&self, entry: &event_outbox::Model) -> Result<()> {
        match entry.event_type.as_str() {
            EVENT_MATERIALS_REGISTERED => {
                let payload: MaterialsRegisteredPayload =
                    serde_json::from_value(entry.payload.clone())?;
                let materials = GitMaterial::find_by_ids(&self.db.pool, &payload.material_ids)
                    .await?
                    .iter()
                    .map(SensorMaterial::from)
                    .collect::<Vec<_>>();
                if materials.is_empty() {
                    return Ok(());
                }
                self.sensor.add_repo(&materials).await?;
            }
            EVENT_MATERIAL_UPDATED => {
                let payload: MaterialUpdatedPayload =
                    serde_json::from_value(entry.payload.clone())?;
                let material = GitMaterial::find_by_id(&self.db.pool, payload.material_id).await?;
                self.sensor
                    .update_repo(&SensorMaterial::from(&material))
                    .await?;
            }
            EVENT_PIPELINE_MATERIALS_SAVED => {
                let payload: PipelineMaterialsSavedPayload =
                    serde_json::from_value(entry.payload.clone())?;
                let materials =
                    CiPipelineMaterial::find_by_ids(&self.db.pool, &payload.ci_pipeline_material_ids)
                        .await?
                        .iter()
                        .map(SensorPipelineMaterial::from)
                        .collect::<Vec<_>>();
                if materials.is_empty() {
                    return Ok(());
                }
                self.sensor.save_pipeline_material(&materials).await?;
            }
            other => {
                return Err(PipelineError::Fatal(format!(
                    "unknown outbox event type {other}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        Audit,
        app::{App, NewApp},
        git_material::NewGitMaterial,
    };
    use db::types::AppType;

    use super::*;
    use crate::services::test_utils::RecordingSensor;

    #[tokio::test]
    async fn failed_dispatch_stays_queued_until_sensor_recovers() {
        let pool = test_support::setup_db().await;
        let db = DBService::from_connection(pool);
        let audit = Audit::now(1);
        let app = App::create(
            &db.pool,
            NewApp {
                name: "web".to_string(),
                display_name: "web".to_string(),
                app_type: AppType::DevtronApp,
                team_id: 1,
                description: None,
            },
            audit,
        )
        .await
        .unwrap();
        let material = GitMaterial::create(
            &db.pool,
            NewGitMaterial {
                app_id: app.id,
                git_provider_id: 7,
                url: "https://g/x/y.git".to_string(),
                name: "7-y".to_string(),
                checkout_path: "./".to_string(),
                fetch_submodules: false,
                filter_pattern: Vec::new(),
            },
            audit,
        )
        .await
        .unwrap();
        EventOutbox::enqueue(
            &db.pool,
            EVENT_MATERIAL_UPDATED,
            db::events::ENTITY_GIT_MATERIAL,
            material.id,
            serde_json::to_value(MaterialUpdatedPayload {
                material_id: material.id,
            })
            .unwrap(),
        )
        .await
        .unwrap();

        let sensor = Arc::new(RecordingSensor::default());
        sensor.set_failing(true);
        let worker = OutboxWorker::new(db.clone(), sensor.clone());

        assert_eq!(worker.flush_pending().await.unwrap(), 0);
        let pending = EventOutbox::fetch_unpublished(&db.pool, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);

        sensor.set_failing(false);
        assert_eq!(worker.flush_pending().await.unwrap(), 1);
        assert!(
            EventOutbox::fetch_unpublished(&db.pool, 10)
                .await
                .unwrap()
                .is_empty()
        );
        let updates = sensor.updated();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "7-y");
        assert!(!updates[0].deleted);
    }

    #[tokio::test]
    async fn unknown_event_type_is_recorded_as_failure() {
        let pool = test_support::setup_db().await;
        let db = DBService::from_connection(pool);
        EventOutbox::enqueue(&db.pool, "chart.pushed", "chart", 1, serde_json::json!({}))
            .await
            .unwrap();
        let worker = OutboxWorker::new(db.clone(), Arc::new(RecordingSensor::default()));
        assert_eq!(worker.flush_pending().await.unwrap(), 0);
        let pending = EventOutbox::fetch_unpublished(&db.pool, 10).await.unwrap();
        assert_eq!(
            pending[0].last_error.as_deref(),
            Some("unknown outbox event type chart.pushed")
        );
    }
}
