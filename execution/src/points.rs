//! Point payouts through the external platform.

use crate::store::{OrderWrite, RecordStore};
use anyhow::{anyhow, Context as _, Result};
use mooncake_types::{OrderStatus, PointsOrder, TransitionError};
use std::future::Future;
use tracing::{error, info};

/// External point transfer. Errors are opaque and stored verbatim on the order.
pub trait PointDistributor: Send + Sync {
    fn distribute(
        &self,
        username: &str,
        points: u64,
        memo: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Runs pending orders through one distribution attempt each.
pub struct Payouts<P> {
    distributor: P,
    dry_run: bool,
}

impl<P: PointDistributor> Payouts<P> {
    pub fn new(distributor: P, dry_run: bool) -> Self {
        Self {
            distributor,
            dry_run,
        }
    }

    pub fn distributor(&self) -> &P {
        &self.distributor
    }

    /// Attempt a pending order and persist `success` or `failed`.
    ///
    /// A distribution failure is recorded on the order, not returned. Errors
    /// are returned for an order that is not pending, a failed save, or a
    /// stored order that another writer already moved.
    pub async fn deliver<S: RecordStore>(
        &self,
        store: &S,
        recipient: &str,
        order: &mut PointsOrder,
    ) -> Result<OrderStatus> {
        if order.status != OrderStatus::Pending {
            return Err(TransitionError {
                order: order.id,
                from: order.status,
                to: OrderStatus::Success,
            }
            .into());
        }

        let memo = order.distribution_memo();
        let outcome = if self.dry_run {
            info!(
                order = %order.id,
                recipient,
                points = order.points,
                memo = %memo,
                "dry run, skipping distribution"
            );
            Ok(())
        } else {
            self.distributor
                .distribute(recipient, order.points, &memo)
                .await
        };

        match outcome {
            Ok(()) => {
                order.succeed()?;
                info!(order = %order.id, recipient, points = order.points, "distributed points");
            }
            Err(err) => {
                let reason = format!("{err:#}");
                error!(
                    order = %order.id,
                    recipient,
                    points = order.points,
                    error = %reason,
                    "point distribution failed"
                );
                order.fail(reason)?;
            }
        }

        let write = store
            .transition_order(order, OrderStatus::Pending)
            .await
            .with_context(|| format!("saving outcome of order {}", order.id))?;
        match write {
            OrderWrite::Applied => Ok(order.status),
            OrderWrite::Conflict(stored) => Err(anyhow!(
                "order {} moved to {stored} while being distributed",
                order.id
            )),
            OrderWrite::Missing => Err(anyhow!("order {} not found", order.id)),
        }
    }
}
