//! [`CacheStorage`] for the SQLite backend.
//!
//! Stores live in `caches`; entries in `entries`, removed with their store via
//! `ON DELETE CASCADE`.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

use super::connection::CacheDb;
use super::storage::CacheStorage;
use crate::Error;
use crate::http::{Headers, RequestKey, StoredResponse};

/// Columns as read from `entries`, before decoding.
struct EntryRow {
    response_url: String,
    status_code: i64,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn decode(self) -> Result<StoredResponse, Error> {
        let url = Url::parse(&self.response_url).map_err(|e| Error::CorruptEntry(format!("url: {e}")))?;
        let status = u16::try_from(self.status_code)
            .map_err(|_| Error::CorruptEntry(format!("status out of range: {}", self.status_code)))?;
        let headers: Headers =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;

        Ok(StoredResponse {
            url,
            status,
            response_type: self.response_type.parse()?,
            headers,
            body: Bytes::from(self.body),
            stored_at: self.stored_at,
        })
    }
}

/// Row ready for insertion; encoded on the caller's task.
struct NewEntry {
    entry_key: String,
    method: String,
    url: String,
    status_code: i64,
    response_type: &'static str,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl NewEntry {
    fn encode(key: &RequestKey, response: StoredResponse) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(format!("headers: {e}")))?;
        Ok(Self {
            entry_key: key.entry_id(),
            method: key.method.clone(),
            url: key.url.to_string(),
            status_code: i64::from(response.status),
            response_type: response.response_type.as_str(),
            response_url: response.url.to_string(),
            headers_json,
            body: response.body.to_vec(),
            stored_at: response.stored_at,
        })
    }
}

fn ensure_store(conn: &rusqlite::Connection, name: &str) -> Result<bool, rusqlite::Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at, seq)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM caches))",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

fn upsert_entry(conn: &rusqlite::Connection, name: &str, entry: &NewEntry) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO entries (
            cache_name, entry_key, method, url, status_code, response_type,
            response_url, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(cache_name, entry_key) DO UPDATE SET
            status_code = excluded.status_code,
            response_type = excluded.response_type,
            response_url = excluded.response_url,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            name,
            &entry.entry_key,
            &entry.method,
            &entry.url,
            entry.status_code,
            entry.response_type,
            &entry.response_url,
            &entry.headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { Ok(ensure_store(conn, &name)?) })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let name = name.to_string();
        let entry_key = key.entry_id();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT response_url, status_code, response_type, headers_json, body, stored_at
                         FROM entries WHERE cache_name = ?1 AND entry_key = ?2",
                        params![name, entry_key],
                        |row| {
                            Ok(EntryRow {
                                response_url: row.get(0)?,
                                status_code: row.get(1)?,
                                response_type: row.get(2)?,
                                headers_json: row.get(3)?,
                                body: row.get(4)?,
                                stored_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }

    async fn put(&self, name: &str, key: &RequestKey, response: StoredResponse) -> Result<(), Error> {
        let name = name.to_string();
        let entry = NewEntry::encode(key, response)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &name)?;
                upsert_entry(&tx, &name, &entry)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<(), Error> {
        let name = name.to_string();
        let rows = entries
            .into_iter()
            .map(|(key, response)| NewEntry::encode(&key, response))
            .collect::<Result<Vec<_>, _>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &name)?;
                for row in &rows {
                    upsert_entry(&tx, &name, row)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let name = name.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE cache_name = ?1 ORDER BY rowid")?;
                let rows = stmt
                    .query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url)| {
                let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(format!("url: {e}")))?;
                Ok(RequestKey { method, url })
            })
            .collect()
    }
}
