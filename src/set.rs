use crate::error::Error;
use crate::ota::OtaInfo;
use crate::platform::Platform;
use crate::Nvs;
use alloc::vec::Vec;

pub trait Set<T> {
    fn set(&mut self, key: u16, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, key: u16, value: T) -> Result<(), Error> {
        (*self).set(key, value)
    }
}

impl<T: Platform> Set<bool> for Nvs<T> {
    fn set(&mut self, key: u16, value: bool) -> Result<(), Error> {
        self.write_item_internal(key, &[value as u8])
    }
}

impl<T: Platform> Set<u8> for Nvs<T> {
    fn set(&mut self, key: u16, value: u8) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u16> for Nvs<T> {
    fn set(&mut self, key: u16, value: u16) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u32> for Nvs<T> {
    fn set(&mut self, key: u16, value: u32) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u64> for Nvs<T> {
    fn set(&mut self, key: u16, value: u64) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i8> for Nvs<T> {
    fn set(&mut self, key: u16, value: i8) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i16> for Nvs<T> {
    fn set(&mut self, key: u16, value: i16) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i32> for Nvs<T> {
    fn set(&mut self, key: u16, value: i32) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i64> for Nvs<T> {
    fn set(&mut self, key: u16, value: i64) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<&[u8]> for Nvs<T> {
    fn set(&mut self, key: u16, value: &[u8]) -> Result<(), Error> {
        self.write_item_internal(key, value)
    }
}

impl<T: Platform> Set<Vec<u8>> for Nvs<T> {
    fn set(&mut self, key: u16, value: Vec<u8>) -> Result<(), Error> {
        self.write_item_internal(key, &value)
    }
}

impl<T: Platform> Set<&OtaInfo> for Nvs<T> {
    fn set(&mut self, key: u16, value: &OtaInfo) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_bytes())
    }
}

impl<T: Platform> Set<OtaInfo> for Nvs<T> {
    fn set(&mut self, key: u16, value: OtaInfo) -> Result<(), Error> {
        self.write_item_internal(key, &value.to_bytes())
    }
}
