//! Static entity descriptors: table names, columns, and write allow-lists
//! for every entity family the data layer serves.

use serde::{Deserialize, Serialize};

/// Entity families. One storage table per kind (snake_case columns).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Users,
    Pieces,
    Blocks,
    Plans,
    Assignments,
    SessionLogs,
    BlockLogs,
    WeeklyFeedback,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Users,
        EntityKind::Pieces,
        EntityKind::Blocks,
        EntityKind::Plans,
        EntityKind::Assignments,
        EntityKind::SessionLogs,
        EntityKind::BlockLogs,
        EntityKind::WeeklyFeedback,
    ];

    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Users => &USERS,
            EntityKind::Pieces => &PIECES,
            EntityKind::Blocks => &BLOCKS,
            EntityKind::Plans => &PLANS,
            EntityKind::Assignments => &ASSIGNMENTS,
            EntityKind::SessionLogs => &SESSION_LOGS,
            EntityKind::BlockLogs => &BLOCK_LOGS,
            EntityKind::WeeklyFeedback => &WEEKLY_FEEDBACK,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().table_name
    }
}

/// User roles. Closed set; anything else normalizes to the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const DEFAULT: Role = Role::Student;

    /// Case-insensitive parse against the closed set.
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "TEACHER" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: &'static str,
    /// Whether the column has a DB default (gen_random_uuid(), NOW()).
    pub has_default: bool,
}

const fn col(name: &'static str, pg_type: &'static str) -> ColumnDef {
    ColumnDef { name, pg_type, has_default: false }
}

const fn col_default(name: &'static str, pg_type: &'static str) -> ColumnDef {
    ColumnDef { name, pg_type, has_default: true }
}

#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table_name: &'static str,
    /// Single-column uuid primary key on every table.
    pub pk: &'static str,
    pub columns: &'static [ColumnDef],
    /// Closed set of columns an update may touch (snake_case; the client
    /// also accepts the camelCase spellings). `None` means every column
    /// except the PK and audit timestamps.
    pub updatable: Option<&'static [&'static str]>,
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Whether an update payload may set this (snake_case) column.
    pub fn is_updatable(&self, name: &str) -> bool {
        if name == self.pk || name == "created_at" || name == "updated_at" {
            return false;
        }
        match self.updatable {
            Some(list) => list.contains(&name),
            None => self.has_column(name),
        }
    }
}

static USERS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Users,
    table_name: "users",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("email", "text"),
        col("display_name", "text"),
        col("full_name", "text"),
        col("first_name", "text"),
        col("last_name", "text"),
        col("role", "text"),
        col("teacher_id", "uuid"),
        col_default("activo", "boolean"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: None,
};

static PIECES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Pieces,
    table_name: "pieces",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("nombre", "text"),
        col("descripcion", "text"),
        col("video_url", "text"),
        col("metadata", "jsonb"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: None,
};

static BLOCKS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Blocks,
    table_name: "blocks",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("nombre", "text"),
        col("descripcion", "text"),
        col("pattern", "jsonb"),
        col("video_url", "text"),
        col("metadata", "jsonb"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: None,
};

static PLANS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Plans,
    table_name: "plans",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("nombre", "text"),
        col("descripcion", "text"),
        col("bloques", "jsonb"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: None,
};

/// Columns an assignment update may touch. Everything else (student link,
/// audit columns, the PK) is server-managed or relational and is dropped
/// with a warning.
pub static ASSIGNMENT_UPDATABLE: &[&str] = &[
    "teacher_id",
    "piece_snapshot",
    "plan_id",
    "plan_adaptado",
    "plan",
    "estado",
    "notas",
];

static ASSIGNMENTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Assignments,
    table_name: "assignments",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("student_id", "uuid"),
        col("teacher_id", "uuid"),
        col("piece_snapshot", "jsonb"),
        col("plan_id", "uuid"),
        col("plan_adaptado", "jsonb"),
        col("plan", "jsonb"),
        col("estado", "text"),
        col("notas", "text"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: Some(ASSIGNMENT_UPDATABLE),
};

static SESSION_LOGS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::SessionLogs,
    table_name: "session_logs",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("student_id", "uuid"),
        col("assignment_id", "uuid"),
        col("inicio_iso", "text"),
        col("fin_iso", "text"),
        col("duracion_min", "integer"),
        col("bloques", "jsonb"),
        col_default("created_at", "timestamptz"),
    ],
    updatable: None,
};

static BLOCK_LOGS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::BlockLogs,
    table_name: "block_logs",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("session_id", "uuid"),
        col("block_id", "uuid"),
        col("inicio_iso", "text"),
        col("fin_iso", "text"),
        col("repeticiones", "integer"),
        col_default("created_at", "timestamptz"),
    ],
    updatable: None,
};

static WEEKLY_FEEDBACK: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::WeeklyFeedback,
    table_name: "weekly_feedback",
    pk: "id",
    columns: &[
        col_default("id", "uuid"),
        col("student_id", "uuid"),
        col("teacher_id", "uuid"),
        col("semana_inicio_iso", "text"),
        col("texto", "text"),
        col_default("created_at", "timestamptz"),
        col_default("updated_at", "timestamptz"),
    ],
    updatable: None,
};
