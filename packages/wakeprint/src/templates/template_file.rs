use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use ciborium::{de, ser};
use serde::{Serialize, de::DeserializeOwned};

use super::TemplateSet;
use crate::{Result, WakeprintError, constants::TEMPLATE_FILE_VERSION};

fn write_cbor<W: Write, T: Serialize + ?Sized>(w: W, val: &T) -> Result<()> {
    ser::into_writer(val, w).map_err(|e| WakeprintError::Cbor(e.to_string()))
}
fn read_cbor<R: Read, T: DeserializeOwned>(r: R) -> Result<T> {
    de::from_reader(r).map_err(|e| WakeprintError::Cbor(e.to_string()))
}

/// CBOR persistence.
pub trait TemplateSave: Serialize {
    /// Atomically write CBOR to `path`.
    /// Uses "`<file>.tmp` → rename" on the same filesystem.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");

        {
            let f = File::create(&tmp)?;
            let mut bw = BufWriter::new(f);
            write_cbor(&mut bw, self)?;
            bw.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn save_to_buffer(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_cbor(&mut buf, self)?;
        Ok(buf)
    }
}

pub trait TemplateLoad: DeserializeOwned + Sized {
    /// Hook run on every freshly decoded value.
    fn check(self) -> Result<Self> {
        Ok(self)
    }

    /// Load a CBOR file produced by [`TemplateSave::save_to_file`].
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        read_cbor::<_, Self>(BufReader::new(f))?.check()
    }

    fn load_from_buffer(buf: &[u8]) -> Result<Self> {
        read_cbor::<_, Self>(buf)?.check()
    }
}

impl TemplateSave for TemplateSet {}

impl TemplateLoad for TemplateSet {
    fn check(self) -> Result<Self> {
        if self.version != TEMPLATE_FILE_VERSION {
            return Err(WakeprintError::Templates(format!(
                "template file version {} (expected {TEMPLATE_FILE_VERSION}); re-enroll",
                self.version
            )));
        }
        Ok(self)
    }
}
