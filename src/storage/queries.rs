//! SQL query builders.
//!
//! Generates SQL for diagnosis key storage.
//! Actual execution is handled by the host service.

pub const SCHEMA: &str = "efgs";

/// Table DDL. The unique constraint is what makes retransmissions idempotent
/// across gateway instances.
pub fn build_schema_ddl() -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS {schema}.diagnosis_key_batch (
        origin              VARCHAR(2)   NOT NULL,
        batch_tag           VARCHAR(100) NOT NULL,
        upload_id           VARCHAR(32)  NOT NULL,
        received_at         TIMESTAMPTZ  NOT NULL,
        content_hash        CHAR(64)     NOT NULL,
        signing_thumbprint  CHAR(64)     NOT NULL,
        report              JSONB        NOT NULL,
        CONSTRAINT diagnosis_key_batch_origin_tag UNIQUE (origin, batch_tag)
    );

    CREATE TABLE IF NOT EXISTS {schema}.diagnosis_key (
        id                               BIGSERIAL PRIMARY KEY,
        origin                           VARCHAR(2)   NOT NULL,
        batch_tag                        VARCHAR(100) NOT NULL,
        key_data                         CHAR(32)     NOT NULL,
        rolling_start_interval_number    BIGINT       NOT NULL,
        rolling_period                   INTEGER      NOT NULL,
        transmission_risk_level          INTEGER      NOT NULL,
        visited_countries                VARCHAR(2)[] NOT NULL,
        report_type                      VARCHAR(32),
        days_since_onset_of_symptoms     INTEGER,
        FOREIGN KEY (origin, batch_tag)
            REFERENCES {schema}.diagnosis_key_batch (origin, batch_tag)
    );
    "#,
        schema = SCHEMA
    )
}

/// Get the list of columns for the diagnosis_key table.
///
/// Returns tuples of (column_name, parameter_placeholder).
pub fn get_diagnosis_key_columns() -> Vec<(&'static str, &'static str)> {
    vec![
        ("origin", "$1"),
        ("batch_tag", "$2"),
        ("key_data", "$3"),
        ("rolling_start_interval_number", "$4"),
        ("rolling_period", "$5"),
        ("transmission_risk_level", "$6"),
        ("visited_countries", "$7"),
        ("report_type", "$8"),
        ("days_since_onset_of_symptoms", "$9"),
    ]
}

/// Build INSERT query for diagnosis_key.
pub fn build_diagnosis_key_insert() -> String {
    let columns = get_diagnosis_key_columns();
    let col_names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<&str> = columns.iter().map(|(_, ph)| *ph).collect();

    format!(
        "INSERT INTO {}.diagnosis_key ({}) VALUES ({})",
        SCHEMA,
        col_names.join(", "),
        placeholders.join(", ")
    )
}

/// Build INSERT query for diagnosis_key_batch.
///
/// Returns no row when the (origin, batch_tag) pair already exists; the host
/// must then skip the key inserts and read the recorded outcome instead.
pub fn build_batch_insert() -> String {
    format!(
        "INSERT INTO {}.diagnosis_key_batch \
         (origin, batch_tag, upload_id, received_at, content_hash, signing_thumbprint, report) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (origin, batch_tag) DO NOTHING \
         RETURNING batch_tag",
        SCHEMA
    )
}

/// Build existence check for a batch.
pub fn build_batch_exists() -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {}.diagnosis_key_batch WHERE origin = $1 AND batch_tag = $2)",
        SCHEMA
    )
}

/// Build lookup of the outcome recorded for a batch.
pub fn build_recorded_outcome_select() -> String {
    format!(
        "SELECT report FROM {}.diagnosis_key_batch WHERE origin = $1 AND batch_tag = $2",
        SCHEMA
    )
}
