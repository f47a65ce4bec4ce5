//! Execution of parsed G-code on a print head.

use embedded_hal::{delay::DelayNs, digital::InputPin};

use super::parser::Instruction;
use crate::utils::{
    controllers::{DeviceError, PrintHead, TachoDriver},
    Duration,
};

/// Execute a single instruction.
pub fn run_instruction<M, S, D>(
    printhead: &mut PrintHead<M, S, D>,
    instruction: &Instruction,
) -> Result<(), DeviceError<M::Error>>
where
    M: TachoDriver,
    S: InputPin,
    D: DelayNs,
{
    match instruction {
        Instruction::LinearMove(cmd) => printhead.linear_move(cmd),
        Instruction::Pause { micros } => {
            printhead.pause(Duration::from_micros(*micros));
            Ok(())
        }
        Instruction::SetPositioning { mode } => {
            printhead.set_position_mode(*mode);
            Ok(())
        }
        Instruction::SetPosition { x, y, z, e } => {
            printhead.set_position(*x, *y, *z, *e);
            Ok(())
        }
        Instruction::Home(axes) => printhead.home(*axes),
        Instruction::Release(axes) => printhead.release(*axes),
    }
}

/// Execute `instructions` in order, stopping at the first device error.
pub fn run_gcode<M, S, D>(
    printhead: &mut PrintHead<M, S, D>,
    instructions: &[Instruction],
) -> Result<(), DeviceError<M::Error>>
where
    M: TachoDriver,
    S: InputPin,
    D: DelayNs,
{
    tracing::info!(count = instructions.len(), "Running G-code");
    for (index, instruction) in instructions.iter().enumerate() {
        tracing::trace!(index, ?instruction, "Instruction");
        if let Err(e) = run_instruction(printhead, instruction) {
            tracing::error!(index, ?instruction, "Instruction failed: {}", e);
            // never leave motors running after a failure
            let _ = printhead.stop_all();
            return Err(e);
        }
    }
    tracing::info!(position = ?printhead.position(), "G-code finished");
    Ok(())
}
