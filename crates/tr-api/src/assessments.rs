use serde::Deserialize;
use tr_auth::Result;

use crate::TreinoApi;
use crate::models::{Assessment, Id};

#[derive(Deserialize)]
struct AssessmentsEnvelope {
    #[serde(default)]
    assessments: Vec<Assessment>,
}

impl TreinoApi {
    pub async fn list_assessments(&self, student_id: &Id) -> Result<Vec<Assessment>> {
        let envelope: AssessmentsEnvelope = self
            .client
            .get(&format!("/assessment/getAll/{}", student_id))
            .await?;
        Ok(envelope.assessments)
    }
}
