use common::SubmissionStatus;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub code: String,

    pub problem_id: Uuid,
    pub language_id: Uuid,

    pub status: SubmissionStatus,
    /// 0-100, set once test cases have run.
    pub score: Option<i32>,
    pub execution_time_ms: Option<i64>, // sum over test cases
    pub memory_used_kb: Option<i64>,    // peak over test cases

    #[sea_orm(column_type = "Text", nullable)]
    pub compilation_error: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub runtime_error: Option<String>,

    pub created_at: DateTimeUtc,
    /// Set when a worker claims the submission.
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::problem::Entity",
        from = "Column::ProblemId",
        to = "super::problem::Column::Id"
    )]
    Problem,
    #[sea_orm(
        belongs_to = "super::language::Entity",
        from = "Column::LanguageId",
        to = "super::language::Column::Id"
    )]
    Language,
    #[sea_orm(has_many = "super::test_case_result::Entity")]
    Results,
}

impl Related<super::problem::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Problem.def()
    }
}

impl Related<super::language::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Language.def()
    }
}

impl Related<super::test_case_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
