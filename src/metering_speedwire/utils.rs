/// Round to two decimals, the precision every value is published with
pub fn round2(value: f64) -> f64 {
    /* ties go to the even neighbour, a reading of 230.125 V is 230.12 */
    return (value * 100.0).round_ties_even() / 100.0;
}

/// Big endian unsigned integer of 1 to 8 bytes starting at `pos`
pub fn read_be_uint(data: &[u8], pos: usize, len: usize) -> Option<u64> {
    if len == 0 || len > 8 {
        return None;
    }
    let end = pos.checked_add(len)?;
    let bytes = data.get(pos..end)?;

    let mut value: u64 = 0;
    for b in bytes {
        value = value << 8 | *b as u64;
    }
    return Some(value);
}

pub fn read_be_u16(data: &[u8], pos: usize) -> Option<u16> {
    return read_be_uint(data, pos, 2).map(|v| v as u16);
}

pub fn read_be_u32(data: &[u8], pos: usize) -> Option<u32> {
    return read_be_uint(data, pos, 4).map(|v| v as u32);
}

/// Render the software version record, the lowest byte is the release type letter
pub fn format_firmware(raw: u64) -> String {
    let major = (raw >> 24) & 0xFF;
    let minor = (raw >> 16) & 0xFF;
    let build = (raw >> 8) & 0xFF;
    let release = char::from((raw & 0xFF) as u8);
    return format!("{major}.{minor}.{build}.{release}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(229.876), 229.88);
        assert_eq!(round2(-0.004), 0.0);
        assert_eq!(round2(1.0 / 3.0), 0.33);
    }

    #[test]
    fn test_round2_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(230.125), 230.12);
        assert_eq!(round2(230.625), 230.62);
        assert_eq!(round2(-0.125), -0.12);
    }

    #[test]
    fn test_read_be_uint() {
        let data = [0x00, 0x01, 0x04, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(read_be_u32(&data, 0), Some(0x00010400));
        assert_eq!(read_be_u16(&data, 1), Some(0x0104));
        assert_eq!(read_be_uint(&data, 1, 8), Some(0x010400FFFFFFFF01));
        assert_eq!(read_be_uint(&data, 6, 4), None);
        assert_eq!(read_be_uint(&data, usize::MAX, 4), None);
        assert_eq!(read_be_uint(&data, 0, 9), None);
    }

    #[test]
    fn test_format_firmware() {
        assert_eq!(format_firmware(0x02001252), "2.0.18.R");
        assert_eq!(format_firmware(0x01020442), "1.2.4.B");
    }
}
