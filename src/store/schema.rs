//! SQL DDL for the three logical tables (spec §4.5): `Text`, `TextNGram`,
//! `TextHasNGram`. `TextHasNGram` records, per `(text_id, size)`, that
//! n-gram generation for that size has already run — the idempotency guard
//! ingest consults before regenerating.

pub const CREATE_TEXT_SQL: &str = "
CREATE TABLE IF NOT EXISTS Text (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    work TEXT NOT NULL,
    siglum TEXT NOT NULL,
    checksum TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    UNIQUE (work, siglum)
)";

pub const CREATE_TEXTNGRAM_SQL: &str = "
CREATE TABLE IF NOT EXISTS TextNGram (
    text_id INTEGER NOT NULL REFERENCES Text (id),
    ngram TEXT NOT NULL,
    size INTEGER NOT NULL,
    count INTEGER NOT NULL
)";

pub const CREATE_TEXTHASNGRAM_SQL: &str = "
CREATE TABLE IF NOT EXISTS TextHasNGram (
    text_id INTEGER NOT NULL REFERENCES Text (id),
    size INTEGER NOT NULL,
    count INTEGER NOT NULL,
    PRIMARY KEY (text_id, size)
)";

pub const CREATE_INDEX_TEXTNGRAM_NGRAM_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_textngram_ngram_size ON TextNGram (ngram, size)";
pub const CREATE_INDEX_TEXTNGRAM_TEXT_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_textngram_text_id ON TextNGram (text_id)";

pub const DROP_INDEX_TEXTNGRAM_NGRAM_SQL: &str = "DROP INDEX IF EXISTS idx_textngram_ngram_size";
pub const DROP_INDEX_TEXTNGRAM_TEXT_SQL: &str = "DROP INDEX IF EXISTS idx_textngram_text_id";

pub const INSERT_TEXT_SQL: &str =
    "INSERT INTO Text (work, siglum, checksum, token_count) VALUES (?1, ?2, ?3, ?4)";
pub const UPDATE_TEXT_SQL: &str =
    "UPDATE Text SET checksum = ?1, token_count = ?2 WHERE id = ?3";
pub const SELECT_TEXT_SQL: &str =
    "SELECT id, checksum FROM Text WHERE work = ?1 AND siglum = ?2";

pub const DELETE_TEXT_NGRAMS_SQL: &str = "DELETE FROM TextNGram WHERE text_id = ?1";
pub const DELETE_TEXT_HAS_NGRAMS_SQL: &str = "DELETE FROM TextHasNGram WHERE text_id = ?1";

pub const SELECT_HAS_NGRAMS_SQL: &str =
    "SELECT 1 FROM TextHasNGram WHERE text_id = ?1 AND size = ?2";
pub const INSERT_TEXT_HAS_NGRAM_SQL: &str =
    "INSERT INTO TextHasNGram (text_id, size, count) VALUES (?1, ?2, ?3)";
pub const INSERT_NGRAM_SQL: &str =
    "INSERT INTO TextNGram (text_id, ngram, size, count) VALUES (?1, ?2, ?3, ?4)";

pub const SELECT_TEXT_NGRAM_COUNTS_SQL: &str = "
SELECT Text.work, Text.siglum, TextNGram.ngram, TextNGram.size, TextNGram.count
FROM TextNGram
JOIN Text ON Text.id = TextNGram.text_id
WHERE Text.work = ?1
";

pub const SELECT_COUNTS_SQL: &str = "
SELECT Text.work, Text.siglum, TextHasNGram.size, TextHasNGram.count,
       (SELECT COALESCE(SUM(TextNGram.count), 0) FROM TextNGram
        WHERE TextNGram.text_id = Text.id AND TextNGram.size = TextHasNGram.size),
       Text.token_count
FROM TextHasNGram
JOIN Text ON Text.id = TextHasNGram.text_id
WHERE Text.work = ?1
ORDER BY TextHasNGram.size
";

pub const ANALYSE_SQL: &str = "ANALYZE";
