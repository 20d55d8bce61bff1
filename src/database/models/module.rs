use sqlx::FromRow;

/// Storage shape of `modules`; `definition` holds the JSON module document
#[derive(Debug, Clone, FromRow)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub enabled: i64,
    pub definition: String,
    pub installed_at: String,
}
