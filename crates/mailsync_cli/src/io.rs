//! File-backed source and remote for command-line runs.
//!
//! The source reads one JSON record per line from an archive dump. The
//! remote stand-in appends created entities to an export file and
//! rebuilds its state from that file on open, so an interrupted run can
//! seed the duplicate index with everything already exported.

use mailsync_core::{Record, RecordId};
use mailsync_engine::{
    ContactFields, ContactRef, RecordSource, RecordStatus, RemoteError, RemoteId, RemoteWriter,
    SourceError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

/// A record source over a JSON-lines archive dump.
pub struct JsonlSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    total: u64,
}

impl JsonlSource {
    /// Opens an archive dump and counts its records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let total = count_records(&path)?;
        let lines = open_lines(&path)?;
        Ok(Self { path, lines, total })
    }
}

impl RecordSource for JsonlSource {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        for line in self.lines.by_ref() {
            let line = line.map_err(|e| SourceError::read(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)
                .map_err(|e| SourceError::read(format!("malformed record line: {e}")))?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn seek(&mut self, offset: u64) -> Result<(), SourceError> {
        if offset > self.total {
            return Err(SourceError::SeekOutOfRange { offset });
        }
        self.lines = open_lines(&self.path)?;
        let mut skipped = 0;
        while skipped < offset {
            match self.lines.next() {
                Some(line) => {
                    let line = line.map_err(|e| SourceError::read(e.to_string()))?;
                    if !line.trim().is_empty() {
                        skipped += 1;
                    }
                }
                None => return Err(SourceError::SeekOutOfRange { offset }),
            }
        }
        Ok(())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>, SourceError> {
    let file = File::open(path).map_err(|e| {
        SourceError::read(format!("cannot open {}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file).lines())
}

fn count_records(path: &Path) -> Result<u64, SourceError> {
    let mut total = 0;
    for line in open_lines(path)? {
        let line = line.map_err(|e| SourceError::read(e.to_string()))?;
        if !line.trim().is_empty() {
            total += 1;
        }
    }
    Ok(total)
}

/// One line of the export file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExportEntry {
    Record {
        remote_id: RemoteId,
        record: Record,
    },
    Contact {
        contact: ContactRef,
    },
    Status {
        remote_id: RemoteId,
        status: RecordStatus,
    },
}

#[derive(Debug)]
struct JsonlRemoteState {
    file: File,
    records: HashMap<RecordId, RemoteId>,
    exported: Vec<Record>,
    contacts: HashMap<String, ContactRef>,
    statuses: HashMap<RemoteId, RecordStatus>,
    next_id: u64,
}

/// A remote stand-in that appends created entities to an export file.
///
/// Re-opening an existing export rebuilds the remote's state, which
/// lets a resumed run treat previously exported records as already
/// present.
pub struct JsonlRemote {
    state: Mutex<JsonlRemoteState>,
}

impl JsonlRemote {
    /// Opens or creates an export file.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();

        let mut records = HashMap::new();
        let mut exported = Vec::new();
        let mut contacts = HashMap::new();
        let mut statuses = HashMap::new();
        let mut next_id = 0;

        if path.exists() {
            for line in BufReader::new(File::open(&path)?).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: ExportEntry = serde_json::from_str(&line).map_err(|e| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("malformed export line: {e}"),
                    )
                })?;
                next_id += 1;
                match entry {
                    ExportEntry::Record { remote_id, record } => {
                        records.insert(record.id.clone(), remote_id);
                        exported.push(record);
                    }
                    ExportEntry::Contact { contact } => {
                        contacts.insert(contact.email.as_str().to_string(), contact);
                    }
                    ExportEntry::Status { remote_id, status } => {
                        statuses.insert(remote_id, status);
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            state: Mutex::new(JsonlRemoteState {
                file,
                records,
                exported,
                contacts,
                statuses,
                next_id,
            }),
        })
    }

    /// Records already present in the export, for seeding the index.
    pub fn exported_records(&self) -> Vec<Record> {
        self.state.lock().exported.clone()
    }

    /// Number of exported records.
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns the status recorded for a remote id, if any.
    pub fn status(&self, remote_id: &RemoteId) -> Option<RecordStatus> {
        self.state.lock().statuses.get(remote_id).copied()
    }
}

fn append(state: &mut JsonlRemoteState, entry: &ExportEntry) -> Result<(), RemoteError> {
    let line = serde_json::to_string(entry)
        .map_err(|e| RemoteError::rejected(format!("unencodable entry: {e}")))?;
    state
        .file
        .write_all(line.as_bytes())
        .and_then(|()| state.file.write_all(b"\n"))
        .and_then(|()| state.file.flush())
        .map_err(|e| RemoteError::unavailable(format!("export write failed: {e}")))
}

impl RemoteWriter for JsonlRemote {
    fn create_record(
        &self,
        record: &Record,
        _contacts: &[ContactRef],
    ) -> Result<RemoteId, RemoteError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.records.get(&record.id) {
            return Err(RemoteError::rejected(format!(
                "record {} already exported as {}",
                record.id, existing
            )));
        }

        state.next_id += 1;
        let remote_id = RemoteId::new(format!("rem-{}", state.next_id));
        append(
            &mut state,
            &ExportEntry::Record {
                remote_id: remote_id.clone(),
                record: record.clone(),
            },
        )?;
        state.records.insert(record.id.clone(), remote_id.clone());
        state.exported.push(record.clone());
        state.statuses.insert(remote_id.clone(), RecordStatus::Open);
        Ok(remote_id)
    }

    fn find_contact(
        &self,
        email: &mailsync_engine::EmailAddress,
    ) -> Result<Option<ContactRef>, RemoteError> {
        Ok(self.state.lock().contacts.get(email.as_str()).cloned())
    }

    fn create_contact(&self, fields: &ContactFields) -> Result<ContactRef, RemoteError> {
        let mut state = self.state.lock();
        if state.contacts.contains_key(fields.email.as_str()) {
            return Err(RemoteError::rejected(format!(
                "contact {} already exported",
                fields.email
            )));
        }

        state.next_id += 1;
        let contact = ContactRef {
            email: fields.email.clone(),
            display_name: fields.display_name.clone(),
            company: fields.company.clone(),
            remote_id: RemoteId::new(format!("con-{}", state.next_id)),
        };
        append(&mut state, &ExportEntry::Contact { contact: contact.clone() })?;
        state
            .contacts
            .insert(fields.email.as_str().to_string(), contact.clone());
        Ok(contact)
    }

    fn update_status(
        &self,
        remote_id: &RemoteId,
        status: RecordStatus,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        append(
            &mut state,
            &ExportEntry::Status {
                remote_id: remote_id.clone(),
                status,
            },
        )?;
        state.statuses.insert(remote_id.clone(), status);
        Ok(())
    }
}
