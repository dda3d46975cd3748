use tracing::{debug, info, warn};

use super::error::DropboxError;
use super::refresh::{DropboxCredentials, Refreshed, TokenRefresher};
use super::types::basename;
use crate::models::{BatchMoveResult, FailedMove};

/// Moves each of `paths` into `destination`, creating the folder first when needed.
///
/// Moves run one at a time. A failed move is recorded and the batch carries on; only
/// a failure to create the destination aborts the call.
pub async fn batch_move_files(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    paths: &[String],
    destination: &str,
) -> Result<Refreshed<BatchMoveResult>, DropboxError> {
    let api = refresher.api();
    let mut credentials = credentials.clone();
    let mut token_refreshed = false;
    let destination = match destination.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let mut result = BatchMoveResult::default();

    let probe = refresher
        .attempt(&credentials, |token| async move {
            api.folder_status(&token, destination).await
        })
        .await;
    token_refreshed |= credentials.adopt_token(probe.new_access_token);
    let exists = probe.result.unwrap_or_else(|e| {
        debug!("Metadata lookup for {} failed: {}", destination, e);
        false
    });

    if !exists {
        info!("Creating destination folder {}", destination);
        let created = refresher
            .run(&credentials, |token| async move {
                api.create_folder(&token, destination).await
            })
            .await?;
        let ((), refreshed) = credentials.adopt(created);
        token_refreshed |= refreshed;
        result.folder_created = true;
    }

    for path in paths {
        let to_path = format!("{}/{}", destination.trim_end_matches('/'), basename(path));
        let from_path = path.as_str();
        let moved = refresher
            .run(&credentials, |token| {
                let to_path = to_path.clone();
                async move { api.move_file(&token, from_path, &to_path).await }
            })
            .await;

        match moved {
            Ok(moved) => {
                let ((), refreshed) = credentials.adopt(moved);
                token_refreshed |= refreshed;
                result.success.push(path.clone());
            }
            Err(e) => {
                warn!("Failed to move {}: {}", path, e);
                result.failed.push(FailedMove {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Batch move into {}: {} moved, {} failed",
        destination,
        result.success.len(),
        result.failed.len()
    );

    Ok(Refreshed {
        data: result,
        new_access_token: token_refreshed.then_some(credentials.access_token),
    })
}
