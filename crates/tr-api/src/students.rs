use serde::Deserialize;
use serde::de::IgnoredAny;
use tr_auth::Result;

use crate::TreinoApi;
use crate::models::{CreateStudent, Id, Student, UpdateStudent};

#[derive(Deserialize)]
struct StudentsEnvelope {
    #[serde(default)]
    students: Vec<Student>,
}

#[derive(Deserialize)]
struct StudentEnvelope {
    student: Student,
}

impl TreinoApi {
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let envelope: StudentsEnvelope = self.client.get("/student/all").await?;
        Ok(envelope.students)
    }

    pub async fn find_student(&self, student_id: &Id) -> Result<Student> {
        let envelope: StudentEnvelope = self
            .client
            .get(&format!("/student/find/{}", student_id))
            .await?;
        Ok(envelope.student)
    }

    pub async fn create_student(&self, request: &CreateStudent) -> Result<()> {
        let _: IgnoredAny = self.client.post("/student/create", request).await?;
        Ok(())
    }

    pub async fn update_student(&self, request: &UpdateStudent) -> Result<()> {
        let _: IgnoredAny = self.client.post("/student/update", request).await?;
        Ok(())
    }
}
