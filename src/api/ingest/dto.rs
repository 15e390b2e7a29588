use serde::Serialize;

/// Response for a submitted ingestion job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStarted {
    pub ingestion_id: String,
    pub status: &'static str,
}

impl IngestStarted {
    pub fn new(ingestion_id: String) -> Self {
        Self {
            ingestion_id,
            status: "started",
        }
    }
}
