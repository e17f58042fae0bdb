use serde::Deserialize;
use serde::de::IgnoredAny;
use tr_auth::Result;

use crate::TreinoApi;
use crate::models::{
    AddTrainingExercise, CreateTrainingSheet, Exercise, ExerciseGroup, Id, TrainingExercise,
    TrainingSheet, UpdateTrainingSheet,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainingSheetsEnvelope {
    #[serde(default)]
    training_sheets: Vec<TrainingSheet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainingSheetEnvelope {
    training_sheet: TrainingSheet,
}

#[derive(Deserialize)]
struct TrainingExercisesEnvelope {
    #[serde(default)]
    exercises: Vec<TrainingExercise>,
}

#[derive(Deserialize)]
struct TrainingExerciseEnvelope {
    exercise: TrainingExercise,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseGroupsEnvelope {
    #[serde(default)]
    exercise_groups: Vec<ExerciseGroup>,
}

#[derive(Deserialize)]
struct ExerciseCatalogEnvelope {
    #[serde(default)]
    exercises: Vec<Exercise>,
}

impl TreinoApi {
    /// All training sheets of a student, active and canceled
    pub async fn list_training_sheets(&self, student_id: &Id) -> Result<Vec<TrainingSheet>> {
        let envelope: TrainingSheetsEnvelope = self
            .client
            .get(&format!("/training-sheet/many/from/{}", student_id))
            .await?;
        Ok(envelope.training_sheets)
    }

    pub async fn find_training_sheet(&self, training_sheet_id: &Id) -> Result<TrainingSheet> {
        let envelope: TrainingSheetEnvelope = self
            .client
            .get(&format!("/training-sheet/from/{}", training_sheet_id))
            .await?;
        Ok(envelope.training_sheet)
    }

    pub async fn create_training_sheet(&self, request: &CreateTrainingSheet) -> Result<()> {
        let _: IgnoredAny = self
            .client
            .post("/training-sheet/create", request)
            .await?;
        Ok(())
    }

    pub async fn update_training_sheet(
        &self,
        request: &UpdateTrainingSheet,
    ) -> Result<TrainingSheet> {
        let envelope: TrainingSheetEnvelope = self
            .client
            .post("/training-sheet/update", request)
            .await?;
        Ok(envelope.training_sheet)
    }

    /// Exercises assigned to one training group of a sheet
    pub async fn list_training_exercises(
        &self,
        training_group_id: &Id,
    ) -> Result<Vec<TrainingExercise>> {
        let envelope: TrainingExercisesEnvelope = self
            .client
            .get(&format!("/training-sheet/exercises/from/{}", training_group_id))
            .await?;
        Ok(envelope.exercises)
    }

    pub async fn find_training_exercise(
        &self,
        training_sheet_exercise_id: &Id,
    ) -> Result<TrainingExercise> {
        let envelope: TrainingExerciseEnvelope = self
            .client
            .get(&format!(
                "/training-sheet/exercise/from/{}",
                training_sheet_exercise_id
            ))
            .await?;
        Ok(envelope.exercise)
    }

    pub async fn list_exercise_groups(&self) -> Result<Vec<ExerciseGroup>> {
        let envelope: ExerciseGroupsEnvelope =
            self.client.get("/training-sheet/exercise-groups").await?;
        Ok(envelope.exercise_groups)
    }

    /// Exercise catalog for one muscle group
    pub async fn list_exercises_by_group(&self, group_id: &Id) -> Result<Vec<Exercise>> {
        let envelope: ExerciseCatalogEnvelope = self
            .client
            .get(&format!("/training-sheet/exercise-list/from/{}", group_id))
            .await?;
        Ok(envelope.exercises)
    }

    pub async fn add_training_exercise(&self, request: &AddTrainingExercise) -> Result<()> {
        let _: IgnoredAny = self
            .client
            .post("/training-sheet/exercise/create", request)
            .await?;
        Ok(())
    }
}
