//! SQL schema and reference data for the Cadastro SQLite store.

use rusqlite::functions::FunctionFlags;

use crate::encode::normalize;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS permission_modules (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL,
    icon  TEXT
);

CREATE TABLE IF NOT EXISTS permissions (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    module  INTEGER NOT NULL REFERENCES permission_modules(id),
    name    TEXT NOT NULL,
    key     TEXT NOT NULL UNIQUE   -- e.g. 'pessoas', 'pessoas/categorias'
);

CREATE TABLE IF NOT EXISTS categories (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS category_permissions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    category    INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    permission  INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
    UNIQUE (category, permission)
);

CREATE TABLE IF NOT EXISTS states (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    abbreviation  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS cities (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    state        INTEGER NOT NULL REFERENCES states(id),
    name         TEXT NOT NULL,
    external_id  INTEGER UNIQUE    -- IBGE code, when imported
);

CREATE TABLE IF NOT EXISTS people (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    category        INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    email           TEXT,
    corporate_name  TEXT,
    related         INTEGER REFERENCES people(id) ON DELETE SET NULL,
    kind            TEXT NOT NULL DEFAULT 'F' CHECK (kind IN ('F', 'J')),
    supplier        INTEGER NOT NULL DEFAULT 0,
    customer        INTEGER NOT NULL DEFAULT 0,
    manufacturer    INTEGER NOT NULL DEFAULT 0,
    note            TEXT,
    active          INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS employees (
    person            INTEGER PRIMARY KEY REFERENCES people(id) ON DELETE CASCADE,
    mother_name       TEXT,
    father_name       TEXT,
    admission_date    TEXT NOT NULL,   -- YYYY-MM-DD
    termination_date  TEXT
);

-- A login identity; its id is the owning person's id.
CREATE TABLE IF NOT EXISTS users (
    id             INTEGER PRIMARY KEY REFERENCES people(id) ON DELETE CASCADE,
    login          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL      -- argon2 PHC string
);

CREATE TABLE IF NOT EXISTS person_documents (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    person  INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    kind    TEXT NOT NULL,
    value   TEXT NOT NULL,
    UNIQUE (person, kind)
);

CREATE TABLE IF NOT EXISTS person_addresses (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    person       INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    principal    INTEGER NOT NULL DEFAULT 0,
    postal_code  TEXT,
    city         INTEGER NOT NULL REFERENCES cities(id),
    district     TEXT NOT NULL,
    street       TEXT NOT NULL,
    number       TEXT NOT NULL,
    complement   TEXT
);

CREATE TABLE IF NOT EXISTS person_phones (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    person     INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    principal  INTEGER NOT NULL DEFAULT 0,
    number     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_person ON person_documents(person);
CREATE INDEX IF NOT EXISTS idx_addresses_person ON person_addresses(person);
CREATE INDEX IF NOT EXISTS idx_phones_person    ON person_phones(person);
CREATE INDEX IF NOT EXISTS idx_cities_state     ON cities(state);
";

/// Permission points the HTTP layer checks for.
pub const SEED: &str = "
INSERT OR IGNORE INTO permission_modules (id, name, icon)
VALUES (1, 'Pessoas', 'people');

INSERT OR IGNORE INTO permissions (id, module, name, key)
VALUES (1, 1, 'Pessoas', 'pessoas'),
       (2, 1, 'Categorias de pessoas', 'pessoas/categorias');
";

/// Register the scalar functions the queries rely on.
pub fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "str_normalize",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|t| normalize(&t)))
    },
  )
}
