// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI command descriptor blocks: builders used when emulating an
//! initiator, and the decoder the RAM-disk backend dispatches on.

pub mod inquiry;
pub mod read;
pub mod read_capacity;
pub mod report_luns;
pub mod request_sense;
pub mod test_unit_ready;
pub mod write;

use crate::models::data::sense_data::SenseData;

/// ASC for INVALID COMMAND OPERATION CODE.
pub const ASC_INVALID_OPCODE: u8 = 0x20;
/// ASC for LOGICAL BLOCK ADDRESS OUT OF RANGE.
pub const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;
/// ASC for INVALID FIELD IN CDB.
pub const ASC_INVALID_FIELD_IN_CDB: u8 = 0x24;
/// ASC for LOGICAL UNIT NOT SUPPORTED.
pub const ASC_LUN_NOT_SUPPORTED: u8 = 0x25;

const SYNCHRONIZE_CACHE10: u8 = 0x35;
const SYNCHRONIZE_CACHE16: u8 = 0x91;

/// A CDB decoded into the operation the backend performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdbCommand {
    TestUnitReady,
    Inquiry { evpd: bool, page: u8, alloc_len: u16 },
    ReadCapacity10,
    ReadCapacity16 { alloc_len: u32 },
    Read { lba: u64, blocks: u32 },
    Write { lba: u64, blocks: u32 },
    ReportLuns { alloc_len: u32 },
    RequestSense { alloc_len: u8 },
    SynchronizeCache,
}

/// Decodes `cdb`; unknown operation codes become ILLEGAL REQUEST sense.
pub fn decode_cdb(cdb: &[u8; 16]) -> Result<CdbCommand, SenseData> {
    Ok(match cdb[0] {
        test_unit_ready::TEST_UNIT_READY => CdbCommand::TestUnitReady,
        inquiry::INQUIRY_OPCODE => CdbCommand::Inquiry {
            evpd: cdb[1] & 0x01 != 0,
            page: cdb[2],
            alloc_len: u16::from_be_bytes([cdb[3], cdb[4]]),
        },
        read_capacity::READ_CAPACITY10 => CdbCommand::ReadCapacity10,
        read_capacity::SERVICE_ACTION_IN16
            if cdb[1] & 0x1f == read_capacity::SA_READ_CAPACITY16 =>
        {
            CdbCommand::ReadCapacity16 {
                alloc_len: u32::from_be_bytes([cdb[10], cdb[11], cdb[12], cdb[13]]),
            }
        },
        read::READ10 | read::READ16 => {
            let (lba, blocks) = read::parse_lba_blocks(cdb);
            CdbCommand::Read { lba, blocks }
        },
        write::WRITE10 | write::WRITE16 => {
            let (lba, blocks) = read::parse_lba_blocks(cdb);
            CdbCommand::Write { lba, blocks }
        },
        report_luns::REPORT_LUNS => CdbCommand::ReportLuns {
            alloc_len: u32::from_be_bytes([cdb[6], cdb[7], cdb[8], cdb[9]]),
        },
        request_sense::REQUEST_SENSE => CdbCommand::RequestSense { alloc_len: cdb[4] },
        SYNCHRONIZE_CACHE10 | SYNCHRONIZE_CACHE16 => CdbCommand::SynchronizeCache,
        _ => return Err(SenseData::illegal_request(ASC_INVALID_OPCODE, 0)),
    })
}
