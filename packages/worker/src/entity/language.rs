use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "language")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Free-form name, resolved to a `LanguageKind` by the executor.
    pub name: String,
    pub version: String,
    pub docker_image: String,
    pub file_extension: String,

    /// Whitespace-separated override of the default run command.
    #[sea_orm(column_type = "Text", nullable)]
    pub run_command: Option<String>,
    /// Whitespace-separated override of the default compile command.
    #[sea_orm(column_type = "Text", nullable)]
    pub compile_command: Option<String>,

    pub time_limit_seconds: i32,
    pub memory_limit_mb: i32,
    /// Relative CPU weight passed to the container runtime.
    pub cpu_shares: i64,
    pub is_enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::submission::Entity")]
    Submissions,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
