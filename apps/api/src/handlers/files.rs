use axum::Json;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use coffer_application::UploadFileInput;
use coffer_core::{AppError, UserIdentity};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::dto::{FileListQuery, FilePageResponse, UploadResponse};
use crate::error::ApiResult;
use crate::middleware::RequestClient;
use crate::state::AppState;


const FILE_FIELD: &str = "file";

/// `attr-char` from RFC 5987: everything else in `filename*` is percent-encoded.
const RFC5987_ATTR_CHARS: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

pub async fn upload_file_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    RequestClient(client): RequestClient,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let content = field.bytes().await.map_err(multipart_error)?;
        upload = Some(UploadFileInput {
            original_filename,
            content_type,
            content: content.to_vec(),
        });
        break;
    }

    let input = upload.ok_or_else(|| {
        AppError::Validation(format!("multipart field '{FILE_FIELD}' is required"))
    })?;

    let uploaded = state
        .file_intake_service
        .upload(&user, input, &client)
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(uploaded))))
}

pub async fn list_files_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<FileListQuery>,
) -> ApiResult<Json<FilePageResponse>> {
    let criteria = query.criteria()?;
    let page = state
        .file_intake_service
        .list_uploaded_files(&user, &criteria, query.page.unwrap_or(0))
        .await?;

    Ok(Json(FilePageResponse::from(page)))
}

pub async fn download_file_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    RequestClient(client): RequestClient,
    Path((owner, storage_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let downloaded = state
        .file_intake_service
        .download(&user, &owner, &storage_name, &client)
        .await?;

    let disposition = HeaderValue::from_str(&content_disposition(&downloaded.original_filename))
        .map_err(|error| {
            AppError::Internal(format!("invalid content disposition header: {error}"))
        })?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(downloaded.content),
    )
        .into_response())
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(error.body_text());
    }

    AppError::Validation(format!("invalid multipart body: {}", error.body_text()))
}

/// Builds an attachment disposition with an ASCII fallback and an RFC 5987
/// encoded UTF-8 filename.
pub(crate) fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|character| match character {
            '"' | '\\' => '_',
            character if character.is_ascii_graphic() || character == ' ' => character,
            _ => '_',
        })
        .collect();

    let encoded = utf8_percent_encode(filename, RFC5987_ATTR_CHARS);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
