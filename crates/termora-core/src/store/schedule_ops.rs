//! Schedule operations for the Store.

use jiff::Timestamp;

use super::Store;
use crate::{
    error::{Result, TermoraError},
    models::{NewScheduleEntry, ScheduleEntry},
    scheduler::ScheduleRegistry,
};

impl Store {
    pub async fn register_schedule(&self, entry: NewScheduleEntry) -> Result<ScheduleEntry> {
        self.blocking(move |db| db.insert_schedule(&entry)).await
    }

    pub async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        self.blocking(|db| db.list_schedules()).await
    }

    /// Loads all entries into a registry for due-time queries.
    pub async fn schedule_registry(&self) -> Result<ScheduleRegistry> {
        Ok(ScheduleRegistry::from_entries(self.list_schedules().await?))
    }

    pub async fn get_schedule(&self, id: u64) -> Result<ScheduleEntry> {
        self.blocking(move |db| db.get_schedule(id))
            .await?
            .ok_or(TermoraError::ScheduleNotFound { id })
    }

    pub async fn set_schedule_enabled(&self, id: u64, enabled: bool) -> Result<()> {
        self.blocking(move |db| db.set_schedule_enabled(id, enabled))
            .await
    }

    pub async fn mark_fired(&self, id: u64, at: Timestamp) -> Result<()> {
        self.blocking(move |db| db.mark_schedule_fired(id, at)).await
    }

    pub async fn delete_schedule(&self, id: u64) -> Result<()> {
        self.blocking(move |db| db.delete_schedule(id)).await
    }
}
