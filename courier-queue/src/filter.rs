//! Per-delivery recipient predicates.

use courier_common::{DeliveryContext, DeliveryError};
use tracing::debug;

/// Apply the `local_only` / `remote_only` options to the context's
/// recipient list, in place.
///
/// Each recipient splits as `local@domain`. When `local_only` is set, only
/// recipients whose domain matches the configured hostname are kept
/// (`options["hostname"]`, or the context's own hostname when that option
/// is empty or absent); `remote_only` keeps the complement. Both options
/// combine as the intersection. An empty result is not an error: the
/// delivery simply has nothing left to do.
///
/// Applying the filter twice yields the same recipient list as applying it
/// once.
///
/// # Errors
///
/// [`DeliveryError::MalformedAddress`] if any recipient lacks an `@`; the
/// entire delivery is rejected.
pub fn filter_recipients(ctx: &mut DeliveryContext) -> Result<(), DeliveryError> {
    let local_only = ctx.options.contains_key("local_only");
    let remote_only = ctx.options.contains_key("remote_only");

    let hostname = ctx
        .options
        .get("hostname")
        .filter(|hostname| !hostname.is_empty())
        .cloned()
        .unwrap_or_else(|| ctx.our_hostname.clone());

    let mut kept = Vec::with_capacity(ctx.recipients.len());
    for rcpt in &ctx.recipients {
        let Some((_local, domain)) = rcpt.split_once('@') else {
            return Err(DeliveryError::MalformedAddress(rcpt.clone()));
        };

        if local_only && domain != hostname {
            debug!(rcpt = %rcpt, "local_only, skipping");
            continue;
        }
        if remote_only && domain == hostname {
            debug!(rcpt = %rcpt, "remote_only, skipping");
            continue;
        }

        kept.push(rcpt.clone());
    }

    ctx.recipients = kept;
    Ok(())
}
