//! Plan operations for the Store.

use super::Store;
use crate::{
    error::{Result, TermoraError},
    models::Plan,
};

impl Store {
    /// Persists a new plan; IDs are assigned on the returned copy.
    pub async fn save_plan(&self, mut plan: Plan) -> Result<Plan> {
        self.blocking(move |db| {
            db.insert_plan(&mut plan)?;
            Ok(plan)
        })
        .await
    }

    pub async fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        self.blocking(move |db| db.get_plan(id)).await
    }

    /// Like [`Store::get_plan`] but a missing plan is an error.
    pub async fn require_plan(&self, id: u64) -> Result<Plan> {
        self.get_plan(id)
            .await?
            .ok_or(TermoraError::PlanNotFound { id })
    }

    pub async fn recent_plans(&self, limit: usize) -> Result<Vec<Plan>> {
        self.blocking(move |db| db.list_recent_plans(limit)).await
    }

    /// Writes plan status and step progress.
    pub async fn save_progress(&self, plan: &Plan) -> Result<()> {
        let plan = plan.clone();
        self.blocking(move |db| db.save_progress(&plan)).await
    }
}
