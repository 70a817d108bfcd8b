//! Well-known keys and the firmware metadata record kept by the OTA updater.

use crate::error::Error;

/// Keys reserved for system records. Application keys should start above `ConfigKey::MAX`.
#[derive(strum::FromRepr, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConfigKey {
    /// `OtaInfo` of the running and the staged image
    Ota = 1,
}

impl ConfigKey {
    pub const MAX: u16 = ConfigKey::Ota as u16;

    pub const fn key(self) -> u16 {
        self as u16
    }
}

const MD5_SIZE: usize = 16;

/// Version, size and digest of the installed application and of the image staged by an update.
/// Persisted as 48 bytes little-endian in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtaInfo {
    pub app_version: u32,
    pub app_size: u32,
    pub app_md5: [u8; MD5_SIZE],
    pub ota_version: u32,
    pub ota_size: u32,
    pub ota_md5: [u8; MD5_SIZE],
}

impl OtaInfo {
    pub const SIZE: usize = 4 + 4 + MD5_SIZE + 4 + 4 + MD5_SIZE;

    /// A staged image that did not get installed yet.
    pub fn update_pending(&self) -> bool {
        self.ota_version != self.app_version
    }

    /// Records the staged image as the installed application.
    pub fn commit_update(&mut self) {
        self.app_version = self.ota_version;
        self.app_size = self.ota_size;
        self.app_md5 = self.ota_md5;
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.app_version.to_le_bytes());
        buf[4..8].copy_from_slice(&self.app_size.to_le_bytes());
        buf[8..24].copy_from_slice(&self.app_md5);
        buf[24..28].copy_from_slice(&self.ota_version.to_le_bytes());
        buf[28..32].copy_from_slice(&self.ota_size.to_le_bytes());
        buf[32..48].copy_from_slice(&self.ota_md5);
        buf
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        let raw: &[u8; Self::SIZE] = raw.try_into().map_err(|_| Error::Corrupt)?;

        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                raw[offset],
                raw[offset + 1],
                raw[offset + 2],
                raw[offset + 3],
            ])
        };
        let md5_at = |offset: usize| {
            let mut md5 = [0u8; MD5_SIZE];
            md5.copy_from_slice(&raw[offset..offset + MD5_SIZE]);
            md5
        };

        Ok(Self {
            app_version: u32_at(0),
            app_size: u32_at(4),
            app_md5: md5_at(8),
            ota_version: u32_at(24),
            ota_size: u32_at(28),
            ota_md5: md5_at(32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_packed_little_endian() {
        let info = OtaInfo {
            app_version: 0x0102_0304,
            app_size: 0x1000,
            app_md5: [0xAA; 16],
            ota_version: 0x0102_0305,
            ota_size: 0x2000,
            ota_md5: [0xBB; 16],
        };

        let raw = info.to_bytes();
        assert_eq!(raw.len(), 48);
        assert_eq!(&raw[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&raw[4..8], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(raw[8], 0xAA);
        assert_eq!(&raw[24..28], &[0x05, 0x03, 0x02, 0x01]);
        assert_eq!(raw[47], 0xBB);
        assert_eq!(OtaInfo::from_bytes(&raw), Ok(info));
    }

    #[test]
    fn wrong_length_is_corrupt() {
        assert_eq!(OtaInfo::from_bytes(&[0u8; 47]), Err(Error::Corrupt));
        assert_eq!(OtaInfo::from_bytes(&[0u8; 49]), Err(Error::Corrupt));
    }

    #[test]
    fn commit_installs_staged_image() {
        let mut info = OtaInfo {
            app_version: 1,
            ota_version: 2,
            ota_size: 1234,
            ota_md5: [7; 16],
            ..Default::default()
        };
        assert!(info.update_pending());

        info.commit_update();
        assert!(!info.update_pending());
        assert_eq!(info.app_size, 1234);
        assert_eq!(info.app_md5, [7; 16]);
    }

    #[test]
    fn config_keys() {
        assert_eq!(ConfigKey::Ota.key(), 1);
        assert_eq!(ConfigKey::from_repr(1), Some(ConfigKey::Ota));
        assert_eq!(ConfigKey::from_repr(2), None);
    }
}
