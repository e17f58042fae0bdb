use serde::Deserialize;
use serde::de::IgnoredAny;
use tr_auth::Result;

use crate::TreinoApi;
use crate::models::{Anamnesis, CreateAnamnesis, Id, UpdateAnamnesis};

#[derive(Deserialize)]
struct AnamnesisEnvelope {
    #[serde(default)]
    anamnesis: Option<Anamnesis>,
}

impl TreinoApi {
    pub async fn create_anamnesis(&self, request: &CreateAnamnesis) -> Result<()> {
        let _: IgnoredAny = self.client.post("/anamnesis/create", request).await?;
        Ok(())
    }

    pub async fn update_anamnesis(&self, request: &UpdateAnamnesis) -> Result<()> {
        let _: IgnoredAny = self.client.post("/anamnesis/update", request).await?;
        Ok(())
    }

    /// Questionnaire of a student, `None` if it was never filled in
    pub async fn find_anamnesis(&self, student_id: &Id) -> Result<Option<Anamnesis>> {
        let envelope: AnamnesisEnvelope = self
            .client
            .get(&format!("/anamnesis/getById/{}", student_id))
            .await?;
        Ok(envelope.anamnesis)
    }
}
