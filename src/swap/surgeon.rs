use bitcoin::{Address, Amount, OutPoint, Psbt};
use thiserror::Error as ThisError;

/// Value the buyer-facing change output is pinned to, in sats.
pub const CHANGE_VALUE: Amount = Amount::from_sat(1000);

#[derive(ThisError, Debug)]
pub enum SurgeryError {
    #[error("Anchor PSBT is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Failed to decode anchor PSBT: {0}")]
    Decode(#[from] bitcoin::psbt::Error),
    #[error("Anchor PSBT has unexpected shape: {inputs} inputs, {outputs} outputs")]
    UnexpectedShape { inputs: usize, outputs: usize },
}

fn decode(anchor_hex: &str) -> Result<Psbt, SurgeryError> {
    let bytes = hex::decode(anchor_hex)?;
    Ok(Psbt::deserialize(&bytes)?)
}

/// Reshapes the committed anchor PSBT into the half the buyer completes:
/// the funding-only input 1 is dropped, any appended outputs are cut, the
/// payout may be redirected and the change output is pinned to
/// [`CHANGE_VALUE`].
pub fn strip(anchor_hex: &str, destination: Option<&Address>) -> Result<String, SurgeryError> {
    let mut psbt = decode(anchor_hex)?;

    let inputs = psbt.unsigned_tx.input.len();
    let outputs = psbt.unsigned_tx.output.len();
    if inputs < 1
        || !(2..=3).contains(&outputs)
        || psbt.inputs.len() != inputs
        || psbt.outputs.len() != outputs
    {
        return Err(SurgeryError::UnexpectedShape { inputs, outputs });
    }

    if inputs > 1 {
        psbt.unsigned_tx.input.remove(1);
        psbt.inputs.remove(1);
    }

    psbt.unsigned_tx.output.truncate(2);
    psbt.outputs.truncate(2);

    if let Some(destination) = destination {
        psbt.unsigned_tx.output[0].script_pubkey = destination.script_pubkey();
    }
    psbt.unsigned_tx.output[1].value = CHANGE_VALUE;

    Ok(hex::encode(psbt.serialize()))
}

/// The seller's asset input, which keys the order ledger.
pub fn funding_outpoint(anchor_hex: &str) -> Result<OutPoint, SurgeryError> {
    let psbt = decode(anchor_hex)?;
    psbt.unsigned_tx
        .input
        .first()
        .map(|input| input.previous_output)
        .ok_or(SurgeryError::UnexpectedShape {
            inputs: 0,
            outputs: psbt.unsigned_tx.output.len(),
        })
}
