//! Matter attachments: file bytes in the file store, metadata in the record store.
//!
//! Upload writes the file first and the record second; delete removes the file
//! first and the record second. A failure between the two steps is surfaced
//! and leaves the first step in place.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{
    DocumentRecord, MatterDocumentStore, MatterStore, NewDocumentRecord, RecordKind, RecordStore,
};
use crate::error::{DatabaseError, MatterError};
use crate::matters::model::{DOCUMENT_TYPES, clean_text, vocabulary_match};
use crate::storage::FileStore;

/// An incoming file with its form fields.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub title: Option<String>,
    pub doc_type: Option<String>,
}

/// Object key for an upload: `{matter_id}/{unix_millis}-{random}.{ext}`.
pub fn storage_path(matter_id: Uuid, file_name: &str, now: DateTime<Utc>) -> String {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!(
        "{}/{}-{}.{}",
        matter_id,
        now.timestamp_millis(),
        Uuid::new_v4().simple(),
        ext
    )
}

fn prepare(
    matter_id: Uuid,
    upload: &Upload,
    uploaded_by: Option<Uuid>,
    storage_path: String,
) -> Result<NewDocumentRecord, MatterError> {
    if upload.bytes.is_empty() {
        return Err(MatterError::validation("file is empty"));
    }
    let file_name = upload.file_name.trim();
    let title = clean_text(upload.title.clone())
        .or_else(|| (!file_name.is_empty()).then(|| file_name.to_string()))
        .ok_or_else(|| MatterError::validation("title or file name is required"))?;
    let doc_type = match clean_text(upload.doc_type.clone()) {
        Some(raw) => Some(
            vocabulary_match(DOCUMENT_TYPES, &raw)
                .map(str::to_string)
                .ok_or_else(|| MatterError::validation(format!("unknown doc_type '{raw}'")))?,
        ),
        None => None,
    };
    let mime_type = clean_text(upload.content_type.clone())
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| mime_guess::from_path(file_name).first_raw().map(str::to_string));

    Ok(NewDocumentRecord {
        matter_id,
        title,
        doc_type,
        storage_path,
        file_size: i64::try_from(upload.bytes.len()).ok(),
        mime_type,
        uploaded_by,
    })
}

pub async fn upload_document(
    store: &dyn RecordStore,
    files: &dyn FileStore,
    bucket: &str,
    matter_id: Uuid,
    upload: Upload,
    uploaded_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<DocumentRecord, MatterError> {
    let path = storage_path(matter_id, &upload.file_name, now);
    let record = prepare(matter_id, &upload, uploaded_by, path.clone())?;
    store.get_matter(matter_id).await?;

    let stored = files.put(bucket, &path, upload.bytes).await?;
    match store.create_matter_document(&record).await {
        Ok(document) => {
            tracing::info!(
                %matter_id,
                document_id = %document.id,
                path = %stored,
                "document uploaded"
            );
            Ok(document)
        }
        Err(e) => {
            tracing::warn!(
                %matter_id,
                bucket,
                path = %stored,
                error = %e,
                "document metadata insert failed; uploaded file left in place"
            );
            Err(e.into())
        }
    }
}

/// Fetch a document of `matter_id` that exists in the record store.
async fn owned_document(
    store: &dyn RecordStore,
    matter_id: Uuid,
    document_id: Uuid,
) -> Result<DocumentRecord, MatterError> {
    let document = store.get_matter_document(document_id).await?;
    if document.matter_id != matter_id {
        return Err(DatabaseError::NotFound {
            kind: RecordKind::Document,
            id: document_id,
        }
        .into());
    }
    Ok(document)
}

pub async fn download_document(
    store: &dyn RecordStore,
    files: &dyn FileStore,
    bucket: &str,
    matter_id: Uuid,
    document_id: Uuid,
) -> Result<(DocumentRecord, Bytes), MatterError> {
    let document = owned_document(store, matter_id, document_id).await?;
    let bytes = files.get(bucket, &document.storage_path).await?;
    Ok((document, bytes))
}

pub async fn delete_document(
    store: &dyn RecordStore,
    files: &dyn FileStore,
    bucket: &str,
    matter_id: Uuid,
    document_id: Uuid,
) -> Result<(), MatterError> {
    let document = owned_document(store, matter_id, document_id).await?;
    files
        .remove(bucket, std::slice::from_ref(&document.storage_path))
        .await?;
    store.delete_matter_document(document_id).await?;
    tracing::info!(%matter_id, %document_id, "document deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::matters::intake::create_matter;
    use crate::storage::LocalFileStore;
    use crate::testing::{FailOp, FailingStore, date, sample_intake, test_db};

    const BUCKET: &str = "corporate-matters";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn pdf(title: Option<&str>) -> Upload {
        Upload {
            file_name: "Lease Draft.PDF".to_string(),
            content_type: None,
            bytes: Bytes::from_static(b"%PDF-1.7 lease"),
            title: title.map(str::to_string),
            doc_type: Some("contract draft".to_string()),
        }
    }

    #[test]
    fn storage_path_uses_millis_and_lowercase_extension() {
        let id = Uuid::nil();
        let pdf_path = storage_path(id, "Lease Draft.PDF", now());
        assert!(pdf_path.starts_with(&format!("{id}/1704441600000-")));
        assert!(pdf_path.ends_with(".pdf"));
        let bin_path = storage_path(id, "no-extension", now());
        assert!(bin_path.ends_with(".bin"));

        assert_ne!(
            storage_path(id, "a.pdf", now()),
            storage_path(id, "a.pdf", now())
        );
    }

    #[tokio::test]
    async fn same_instant_uploads_keep_their_own_bytes() {
        let (db, _tmp) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = LocalFileStore::new(files_dir.path().to_path_buf());
        let matter = create_matter(db.as_ref(), sample_intake(), None, date(2024, 1, 1))
            .await
            .expect("matter");
        let text = |body: &'static [u8]| Upload {
            file_name: "note.txt".to_string(),
            content_type: None,
            bytes: Bytes::from_static(body),
            title: None,
            doc_type: None,
        };

        let first =
            upload_document(db.as_ref(), &files, BUCKET, matter.id, text(b"FIRST"), None, now())
                .await
                .expect("first upload");
        let second =
            upload_document(db.as_ref(), &files, BUCKET, matter.id, text(b"SECOND"), None, now())
                .await
                .expect("second upload");
        assert_ne!(first.storage_path, second.storage_path);

        let (_, bytes) = download_document(db.as_ref(), &files, BUCKET, matter.id, first.id)
            .await
            .expect("first download");
        assert_eq!(&bytes[..], b"FIRST");

        delete_document(db.as_ref(), &files, BUCKET, matter.id, second.id)
            .await
            .expect("delete second");
        let (_, bytes) = download_document(db.as_ref(), &files, BUCKET, matter.id, first.id)
            .await
            .expect("first survives");
        assert_eq!(&bytes[..], b"FIRST");
    }

    #[tokio::test]
    async fn upload_download_delete_cycle() {
        let (db, _tmp) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = LocalFileStore::new(files_dir.path().to_path_buf());
        let actor = Uuid::new_v4();
        let matter = create_matter(db.as_ref(), sample_intake(), None, date(2024, 1, 1))
            .await
            .expect("matter");

        let doc = upload_document(
            db.as_ref(),
            &files,
            BUCKET,
            matter.id,
            pdf(None),
            Some(actor),
            now(),
        )
        .await
        .expect("upload");
        assert_eq!(doc.title, "Lease Draft.PDF");
        assert_eq!(doc.doc_type.as_deref(), Some("Contract Draft"));
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.file_size, Some(14));
        assert_eq!(doc.uploaded_by, Some(actor));

        let (meta, bytes) = download_document(db.as_ref(), &files, BUCKET, matter.id, doc.id)
            .await
            .expect("download");
        assert_eq!(meta.id, doc.id);
        assert_eq!(&bytes[..], b"%PDF-1.7 lease");

        delete_document(db.as_ref(), &files, BUCKET, matter.id, doc.id)
            .await
            .expect("delete");
        assert!(
            db.list_matter_documents(matter.id)
                .await
                .expect("list")
                .is_empty()
        );
        assert!(!files_dir.path().join(BUCKET).join(&doc.storage_path).exists());
    }

    #[tokio::test]
    async fn failed_metadata_insert_leaves_uploaded_file() {
        let (db, _tmp) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = LocalFileStore::new(files_dir.path().to_path_buf());
        let matter = create_matter(db.as_ref(), sample_intake(), None, date(2024, 1, 1))
            .await
            .expect("matter");
        let failing = FailingStore::new(Arc::clone(&db));
        failing.fail_on(FailOp::Create, RecordKind::Document);

        let err = upload_document(
            &failing,
            &files,
            BUCKET,
            matter.id,
            pdf(Some("Lease")),
            None,
            now(),
        )
        .await
        .expect_err("insert fails");
        assert!(matches!(err, MatterError::Database(_)));

        let matter_dir = files_dir.path().join(BUCKET).join(matter.id.to_string());
        let orphans = std::fs::read_dir(&matter_dir)
            .expect("matter dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".pdf"))
            .count();
        assert_eq!(orphans, 1);
    }

    #[tokio::test]
    async fn upload_rejects_empty_files_and_unknown_types() {
        let (db, _tmp) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = LocalFileStore::new(files_dir.path().to_path_buf());
        let matter_id = Uuid::new_v4();

        let mut empty = pdf(None);
        empty.bytes = Bytes::new();
        let err = upload_document(db.as_ref(), &files, BUCKET, matter_id, empty, None, now())
            .await
            .expect_err("empty");
        assert!(matches!(err, MatterError::Validation(_)));

        let mut odd = pdf(None);
        odd.doc_type = Some("Napkin".to_string());
        let err = upload_document(db.as_ref(), &files, BUCKET, matter_id, odd, None, now())
            .await
            .expect_err("type");
        assert!(matches!(err, MatterError::Validation(_)));
    }

    #[tokio::test]
    async fn documents_are_scoped_to_their_matter() {
        let (db, _tmp) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = LocalFileStore::new(files_dir.path().to_path_buf());
        let matter = create_matter(db.as_ref(), sample_intake(), None, date(2024, 1, 1))
            .await
            .expect("matter");
        let doc = upload_document(db.as_ref(), &files, BUCKET, matter.id, pdf(None), None, now())
            .await
            .expect("upload");

        let err = delete_document(db.as_ref(), &files, BUCKET, Uuid::new_v4(), doc.id)
            .await
            .expect_err("wrong matter");
        assert!(matches!(
            err,
            MatterError::Database(DatabaseError::NotFound { .. })
        ));
        assert!(files_dir.path().join(BUCKET).join(&doc.storage_path).exists());
    }
}
