//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all supported types of the driver.

use crate::error::Error;
use crate::ota::OtaInfo;
use crate::platform::Platform;
use crate::Nvs;
use alloc::vec::Vec;

pub trait Get<T> {
    fn get(&mut self, key: u16) -> Result<Option<T>, Error>;
}

impl<T, G: Get<T>> Get<T> for &mut G {
    fn get(&mut self, key: u16) -> Result<Option<T>, Error> {
        (*self).get(key)
    }
}

impl<T: Platform> Nvs<T> {
    /// Primitives are stored at their natural width, anything else is not a value of that type.
    fn get_primitive<const N: usize>(&mut self, key: u16) -> Result<Option<[u8; N]>, Error> {
        match self.load_value(key)? {
            None => Ok(None),
            Some(raw) => raw.try_into().map(Some).map_err(|_| Error::Corrupt),
        }
    }
}

impl<T: Platform> Get<bool> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<bool>, Error> {
        let value = self.get_primitive::<1>(key)?;
        Ok(value.map(|raw| raw[0] != 0))
    }
}

impl<T: Platform> Get<u8> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<u8>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(u8::from_le_bytes))
    }
}

impl<T: Platform> Get<u16> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<u16>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(u16::from_le_bytes))
    }
}

impl<T: Platform> Get<u32> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<u32>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(u32::from_le_bytes))
    }
}

impl<T: Platform> Get<u64> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<u64>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(u64::from_le_bytes))
    }
}

impl<T: Platform> Get<i8> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<i8>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(i8::from_le_bytes))
    }
}

impl<T: Platform> Get<i16> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<i16>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(i16::from_le_bytes))
    }
}

impl<T: Platform> Get<i32> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<i32>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(i32::from_le_bytes))
    }
}

impl<T: Platform> Get<i64> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<i64>, Error> {
        let value = self.get_primitive(key)?;
        Ok(value.map(i64::from_le_bytes))
    }
}

impl<T: Platform> Get<Vec<u8>> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<Vec<u8>>, Error> {
        self.load_value(key)
    }
}

impl<T: Platform> Get<OtaInfo> for Nvs<T> {
    fn get(&mut self, key: u16) -> Result<Option<OtaInfo>, Error> {
        match self.load_value(key)? {
            None => Ok(None),
            Some(raw) => OtaInfo::from_bytes(&raw).map(Some),
        }
    }
}
