use super::structs::*;
use super::meter_definitions::spec_of;
use super::utils::{read_be_u16, read_be_u32, read_be_uint};
use super::SpeedwireError;
use crate::config::SpeedwireVariant;
use crate::obis_utils::SpeedwireObis;
use log::{debug, trace};

// Unknown records announce their payload size in the third id byte
const OBIS_TYPE_ACTUAL: u8 = 4;
const OBIS_TYPE_COUNTER: u8 = 8;
const FALLBACK_SKIP: usize = 8;

pub fn decode_frame(data: &[u8], variant: SpeedwireVariant) -> Result<DecodedFrame, SpeedwireError> {
    if data.len() < MIN_DATAGRAM_LEN || !data.starts_with(SMA_MARKER) {
        return Err(SpeedwireError::NotSpeedwire);
    }

    let mut parser = SpeedwireParser::new(data, variant);
    let header = parser.parse_header()?;
    let records = parser.parse_records()?;

    debug!("Decoded {} OBIS records from susy {} serial {}", records.len(), header.susy_id, header.serial_number);
    Ok(DecodedFrame { header, records })
}

struct SpeedwireParser<'a> {
    data: &'a [u8],
    pos: usize,
    variant: SpeedwireVariant,
}

impl<'a> SpeedwireParser<'a> {
    fn new(data: &'a [u8], variant: SpeedwireVariant) -> Self {
        Self { data, pos: 0, variant }
    }

    fn parse_header(&mut self) -> Result<DeviceHeader, SpeedwireError> {
        let susy_id = read_be_u16(self.data, SUSY_ID_OFFSET)
            .ok_or_else(|| SpeedwireError::Malformed("Header too short for SusyID".to_string()))?;
        let serial_number = read_be_u32(self.data, SERIAL_OFFSET)
            .ok_or_else(|| SpeedwireError::Malformed("Header too short for serial".to_string()))?;
        let time_tick = read_be_u32(self.data, TIME_TICK_OFFSET)
            .ok_or_else(|| SpeedwireError::Malformed("Header too short for time tick".to_string()))?;

        self.pos = OBIS_START_OFFSET;
        Ok(DeviceHeader { susy_id, serial_number, time_tick })
    }

    fn parse_records(&mut self) -> Result<Vec<(u32, u64)>, SpeedwireError> {
        let mut records = Vec::new();

        while self.pos < self.data.len() {
            let obis_id = read_be_u32(self.data, self.pos)
                .ok_or_else(|| SpeedwireError::Malformed(format!("Truncated OBIS id at position {}", self.pos)))?;

            match spec_of(self.variant, obis_id) {
                Some(spec) if !spec.is_derived() => {
                    self.pos += 4;
                    let raw = read_be_uint(self.data, self.pos, spec.byte_length)
                        .ok_or_else(|| SpeedwireError::Malformed(format!(
                            "Record {} needs {} bytes at position {} but only {} are left",
                            spec.name, spec.byte_length, self.pos, self.data.len() - self.pos)))?;
                    trace!("OBIS {obis_id:08x} ({}) raw {raw}", spec.name);
                    records.push((obis_id, raw));
                    self.pos += spec.byte_length;
                }
                _ => {
                    /* check for end of message */
                    if obis_id == 0 && self.pos == self.data.len() - 4 {
                        trace!("End of message at position {}", self.pos);
                        break;
                    }
                    self.skip_unknown(obis_id);
                }
            }
        }

        Ok(records)
    }

    /// Skip a record we do not model, only 4 and 8 byte payloads are known
    /// to exist so everything else moves on by one id and 4 bytes
    fn skip_unknown(&mut self, obis_id: u32) {
        let hint = self.data[self.pos + 2];
        let skip = match hint {
            OBIS_TYPE_ACTUAL | OBIS_TYPE_COUNTER => hint as usize + 4,
            _ => FALLBACK_SKIP,
        };

        debug!("Skipping unknown OBIS {} ({}) with {} bytes at position {}",
            SpeedwireObis::from_id(obis_id), SpeedwireObis::from_id(obis_id).description().unwrap_or("no description"), skip, self.pos);
        self.pos += skip;
    }
}
