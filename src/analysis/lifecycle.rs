// ABOUTME: Meal lifecycle helpers around the orchestrator
// ABOUTME: Owner-scoped creation and reads, job enqueueing, sync/async dispatch

use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::MealAnalyzer;
use crate::config::AnalyzeMode;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::jobs::{AnalysisJob, JobQueue};
use crate::media::ImageStore;
use crate::models::{AnalysisOutcome, MealItemRecord, MealRecord};

/// How an analysis request was started, depending on the configured mode
#[derive(Debug)]
pub enum AnalysisStart {
    /// Sync mode: the pipeline ran inline and reached a terminal status
    Completed(AnalysisOutcome),
    /// Async mode: a job was enqueued for the worker pool
    Queued {
        /// The meal awaiting analysis
        meal_id: Uuid,
    },
}

/// Create a pending meal for an uploaded image asset.
///
/// The asset must exist and belong to the caller; meals are never attached
/// to another user's upload.
///
/// # Errors
///
/// Returns `AppError::not_found` if the asset does not exist or belongs to
/// another user, and database errors on the insert.
pub async fn create_meal(
    database: &Database,
    user_id: Uuid,
    asset_id: Uuid,
) -> AppResult<MealRecord> {
    let asset = database
        .find_asset_for_owner(asset_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Asset {asset_id}")))?;

    let meal = database.create_meal(user_id, Some(asset.id)).await?;
    debug!("Created meal {} for asset {asset_id}", meal.id);
    Ok(meal)
}

/// Owner-scoped meal read.
///
/// # Errors
///
/// Returns `AppError::not_found` if the meal does not exist or belongs to
/// another user
pub async fn get_meal(database: &Database, meal_id: Uuid, user_id: Uuid) -> AppResult<MealRecord> {
    database
        .get_meal_for_user(meal_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meal {meal_id}")))
}

/// Owner-scoped meal read including its computed items.
///
/// # Errors
///
/// Returns `AppError::not_found` if the meal does not exist or belongs to
/// another user
pub async fn get_meal_with_items(
    database: &Database,
    meal_id: Uuid,
    user_id: Uuid,
) -> AppResult<(MealRecord, Vec<MealItemRecord>)> {
    database
        .get_meal_with_items(meal_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meal {meal_id}")))
}

/// Load a meal's image bytes and enqueue an analysis job for the worker
/// pool. The workers apply the configured retry policy when they pick the
/// job up.
///
/// # Errors
///
/// Returns `AppError::not_found` if the meal or its asset is missing,
/// `AppError::invalid_input` if the meal carries no asset, and storage or
/// queue errors from the byte load and enqueue.
pub async fn enqueue_analysis(
    database: &Database,
    store: &dyn ImageStore,
    queue: &dyn JobQueue,
    meal_id: Uuid,
) -> AppResult<()> {
    let meal = database
        .get_meal(meal_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meal {meal_id}")))?;
    let asset_id = meal
        .asset_id
        .ok_or_else(|| AppError::invalid_input(format!("Meal {meal_id} has no image asset")))?;
    let asset = database
        .find_asset_for_owner(asset_id, meal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Asset {asset_id}")))?;

    let image = store.load(&asset.storage_key).await?;
    let job = AnalysisJob::new(meal.user_id, meal_id, &image, asset.mime);
    queue.enqueue(&job).await?;

    info!("Enqueued analysis for meal {meal_id}");
    Ok(())
}

/// Start an analysis in the configured mode: inline for sync, via the job
/// queue for async.
///
/// # Errors
///
/// Propagates the orchestrator's errors in sync mode and the load/enqueue
/// errors in async mode
pub async fn dispatch_analysis(
    database: &Database,
    store: &dyn ImageStore,
    queue: &dyn JobQueue,
    analyzer: &MealAnalyzer,
    mode: AnalyzeMode,
    meal_id: Uuid,
) -> AppResult<AnalysisStart> {
    match mode {
        AnalyzeMode::Sync => {
            let meal = database
                .get_meal(meal_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Meal {meal_id}")))?;
            let asset_id = meal.asset_id.ok_or_else(|| {
                AppError::invalid_input(format!("Meal {meal_id} has no image asset"))
            })?;
            let outcome = analyzer.analyze(meal_id, asset_id).await?;
            Ok(AnalysisStart::Completed(outcome))
        }
        AnalyzeMode::Async => {
            enqueue_analysis(database, store, queue, meal_id).await?;
            Ok(AnalysisStart::Queued { meal_id })
        }
    }
}
