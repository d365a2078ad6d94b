use super::*;

/// A share as relayed from a downstream miner, destined for whichever upstream the
/// miner's session is bound to.
#[derive(Debug, Clone)]
pub(crate) struct Share {
    pub(crate) session_id: u16,
    pub(crate) job_id: JobId,
    pub(crate) extranonce2: Extranonce,
    pub(crate) ntime: Ntime,
    pub(crate) nonce: Nonce,
    pub(crate) version_bits: Option<Version>,
    pub(crate) is_time_changed: bool,
    pub(crate) is_fake_job: bool,
}

impl Share {
    /// Picks the smallest ex-message encoding that still carries every field the share
    /// needs: plain submit, submit-with-time, submit-with-version, or both.
    pub(crate) fn to_ex_message(&self, extra_nonce2: u32, job_id_byte: u8) -> ExMessage {
        let ntime = self.is_time_changed.then_some(self.ntime.0);
        let version_mask = self.version_bits.map(u32::from);

        ExMessage::submit_share(
            self.session_id,
            extra_nonce2,
            self.nonce.into(),
            job_id_byte,
            ntime,
            version_mask,
        )
    }
}
