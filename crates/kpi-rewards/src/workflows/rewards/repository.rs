use super::domain::{
    CalculationFilter, CalculationId, CalculationStatus, RewardCalculation, RewardProgram,
};
use crate::workflows::records::repository::RepositoryError;

/// Lookup of the reward program that applies to a position.
pub trait RewardProgramRepository: Send + Sync {
    fn program_for_position(&self, position: &str)
        -> Result<Option<RewardProgram>, RepositoryError>;
}

/// Append-only store of calculation runs.
///
/// `update` only succeeds while the stored calculation still has `expected_status`;
/// otherwise the store returns [`RepositoryError::Stale`] and keeps the stored copy.
///
/// Both writes also enforce the per-key rules in the same critical section as the write, through
/// [`ensure_key_open`] and [`ensure_approvable`]: nothing is created for a key that already has an
/// approved run, and only the newest run of a key may become approved.
pub trait CalculationRepository: Send + Sync {
    fn create(&self, calculation: RewardCalculation) -> Result<RewardCalculation, RepositoryError>;
    fn get(&self, id: &CalculationId) -> Result<Option<RewardCalculation>, RepositoryError>;
    fn query(&self, filter: &CalculationFilter) -> Result<Vec<RewardCalculation>, RepositoryError>;
    fn update(
        &self,
        calculation: RewardCalculation,
        expected_status: CalculationStatus,
    ) -> Result<RewardCalculation, RepositoryError>;
}

/// Refuse to create `calculation` when its key already has an approved run.
pub fn ensure_key_open<'a, I>(
    stored: I,
    calculation: &RewardCalculation,
) -> Result<(), RepositoryError>
where
    I: IntoIterator<Item = &'a RewardCalculation>,
{
    let closed = stored.into_iter().any(|existing| {
        existing.same_key(calculation) && existing.status == CalculationStatus::Approved
    });
    if closed {
        Err(RepositoryError::KeyClosed)
    } else {
        Ok(())
    }
}

/// Refuse to store `calculation` as approved while its key has another approved or a newer run.
/// Writes to any other status pass.
pub fn ensure_approvable<'a, I>(
    stored: I,
    calculation: &RewardCalculation,
) -> Result<(), RepositoryError>
where
    I: IntoIterator<Item = &'a RewardCalculation>,
{
    if calculation.status != CalculationStatus::Approved {
        return Ok(());
    }
    let blocked = stored.into_iter().any(|existing| {
        existing.id != calculation.id
            && existing.same_key(calculation)
            && (existing.status == CalculationStatus::Approved
                || existing.is_newer_than(calculation))
    });
    if blocked {
        Err(RepositoryError::KeyClosed)
    } else {
        Ok(())
    }
}
