//! Entity-table DDL. All tables live in a schema named from `ATRIL_SCHEMA`
//! (default `atril`); the assignments table carries the CHECK constraint
//! that keeps the three plan representations mutually exclusive.

use crate::error::DataError;
use sqlx::PgPool;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Create the schema and every entity table if absent. Idempotent.
pub async fn ensure_tables(pool: &PgPool, schema: &str) -> Result<(), DataError> {
    let schema_q = quote(schema);
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema_q))
        .execute(pool)
        .await
        .map_err(DataError::from_db)?;

    let users = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."users" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT NOT NULL,
            display_name TEXT,
            full_name TEXT,
            first_name TEXT,
            last_name TEXT,
            role TEXT NOT NULL DEFAULT 'STUDENT',
            teacher_id UUID REFERENCES {schema}."users"(id),
            activo BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    let pieces = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."pieces" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            nombre TEXT NOT NULL,
            descripcion TEXT,
            video_url TEXT,
            metadata JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    let blocks = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."blocks" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            nombre TEXT NOT NULL,
            descripcion TEXT,
            pattern JSONB,
            video_url TEXT,
            metadata JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    let plans = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."plans" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            nombre TEXT NOT NULL,
            descripcion TEXT,
            bloques JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    // At most one plan representation may be stored per assignment.
    let assignments = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."assignments" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            student_id UUID NOT NULL REFERENCES {schema}."users"(id),
            teacher_id UUID REFERENCES {schema}."users"(id),
            piece_snapshot JSONB,
            plan_id UUID REFERENCES {schema}."plans"(id),
            plan_adaptado JSONB,
            plan JSONB,
            estado TEXT,
            notas TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT assignments_plan_exclusive CHECK (
                (CASE WHEN plan_id IS NOT NULL THEN 1 ELSE 0 END
                 + CASE WHEN plan_adaptado IS NOT NULL THEN 1 ELSE 0 END
                 + CASE WHEN plan IS NOT NULL THEN 1 ELSE 0 END) <= 1
            )
        )
        "#,
        schema = schema_q
    );

    let session_logs = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."session_logs" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            student_id UUID NOT NULL REFERENCES {schema}."users"(id),
            assignment_id UUID REFERENCES {schema}."assignments"(id),
            inicio_iso TEXT,
            fin_iso TEXT,
            duracion_min INTEGER,
            bloques JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    let block_logs = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."block_logs" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            session_id UUID REFERENCES {schema}."session_logs"(id),
            block_id UUID REFERENCES {schema}."blocks"(id),
            inicio_iso TEXT,
            fin_iso TEXT,
            repeticiones INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        schema = schema_q
    );

    let weekly_feedback = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}."weekly_feedback" (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            student_id UUID NOT NULL REFERENCES {schema}."users"(id),
            teacher_id UUID REFERENCES {schema}."users"(id),
            semana_inicio_iso TEXT NOT NULL,
            texto TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (student_id, semana_inicio_iso)
        )
        "#,
        schema = schema_q
    );

    for ddl in [
        users,
        pieces,
        blocks,
        plans,
        assignments,
        session_logs,
        block_logs,
        weekly_feedback,
    ] {
        sqlx::query(&ddl).execute(pool).await.map_err(DataError::from_db)?;
    }

    let indexes = [
        format!(
            "CREATE INDEX IF NOT EXISTS assignments_student_idx ON {}.\"assignments\" (student_id)",
            schema_q
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS assignments_plan_idx ON {}.\"assignments\" (plan_id)",
            schema_q
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS session_logs_student_idx ON {}.\"session_logs\" (student_id)",
            schema_q
        ),
    ];
    for ddl in indexes {
        sqlx::query(&ddl).execute(pool).await.map_err(DataError::from_db)?;
    }
    Ok(())
}
