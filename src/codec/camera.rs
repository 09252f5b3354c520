//! Camera calibration records: intrinsic models, extrinsic pose, parameter block

use std::fmt;

use serde::{Deserialize, Serialize};

use super::native_record;
use crate::error::{exact, CodecError};

/// Number of 64-bit words backing the intrinsic union.
pub const INTRINSIC_WORDS: usize = 16;

/// Camera model id selecting the valid intrinsic variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum CameraModel {
    None = 0,
    OpenCv = 1,
    OpenCvFisheye = 2,
}

impl TryFrom<i32> for CameraModel {
    type Error = CodecError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::OpenCv),
            2 => Ok(Self::OpenCvFisheye),
            other => Err(CodecError::UnknownCameraModel(other)),
        }
    }
}

/// OpenCV pinhole model with radial (k1..k3) and tangential (p1, p2) distortion.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PinholeModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub p1: f64,
    pub p2: f64,
}

/// OpenCV fisheye model.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FisheyeModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

#[repr(C)]
#[derive(Clone, Copy)]
union IntrinsicUnion {
    cv: PinholeModel,
    fisheye: FisheyeModel,
    words: [u64; INTRINSIC_WORDS],
}

/// Intrinsic calibration, tagged by camera model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intrinsics {
    None,
    Pinhole(PinholeModel),
    Fisheye(FisheyeModel),
}

impl Intrinsics {
    pub fn model(&self) -> CameraModel {
        match self {
            Self::None => CameraModel::None,
            Self::Pinhole(_) => CameraModel::OpenCv,
            Self::Fisheye(_) => CameraModel::OpenCvFisheye,
        }
    }
}

/// Camera pose relative to the rig.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CameraExtrinsic {
    rvec: [f64; 3],
    tvec: [f64; 3],
    reserved: [u64; 4],
}

native_record!(CameraExtrinsic, 80);

impl CameraExtrinsic {
    pub fn new(rvec: [f64; 3], tvec: [f64; 3]) -> Self {
        Self {
            rvec,
            tvec,
            reserved: [0; 4],
        }
    }

    /// Rotation vector (Rodrigues).
    pub fn rvec(&self) -> [f64; 3] {
        self.rvec
    }

    pub fn set_rvec(&mut self, value: &[f64]) -> Result<(), CodecError> {
        self.rvec = exact("rvec", value)?;
        Ok(())
    }

    pub fn tvec(&self) -> [f64; 3] {
        self.tvec
    }

    pub fn set_tvec(&mut self, value: &[f64]) -> Result<(), CodecError> {
        self.tvec = exact("tvec", value)?;
        Ok(())
    }

    pub fn reserved(&self) -> [u64; 4] {
        self.reserved
    }

    pub fn set_reserved(&mut self, value: &[u64]) -> Result<(), CodecError> {
        self.reserved = exact("extrinsic.reserved", value)?;
        Ok(())
    }
}

impl fmt::Debug for CameraExtrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraExtrinsic")
            .field("rvec", &self.rvec)
            .field("tvec", &self.tvec)
            .field("reserved", &self.reserved)
            .finish()
    }
}

/// Calibration block carried in every device info record.
///
/// The intrinsic union is only meaningful for the variant named by the camera
/// model id. [`set_intrinsics`](Self::set_intrinsics) writes both together;
/// the raw word accessors bypass the tag and exist for bulk transfer.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CameraParameter {
    camera_model: i32,
    pub reserved0: u32,
    pub intrinsic_id: u64,
    pub extrinsic_id: u64,
    reserved1: [u64; 3],
    intrinsic: IntrinsicUnion,
    pub extrinsic: CameraExtrinsic,
}

native_record!(CameraParameter, 256);

impl CameraParameter {
    pub fn camera_model(&self) -> Result<CameraModel, CodecError> {
        CameraModel::try_from(self.camera_model)
    }

    /// Model id exactly as stored, including ids this crate does not know.
    pub fn raw_camera_model(&self) -> i32 {
        self.camera_model
    }

    /// Overwrites the model id without touching the union.
    pub fn set_raw_camera_model(&mut self, raw: i32) {
        self.camera_model = raw;
    }

    pub fn intrinsics(&self) -> Result<Intrinsics, CodecError> {
        // SAFETY: every union variant is plain f64/u64 data, so any bit pattern is valid.
        let intrinsics = match self.camera_model()? {
            CameraModel::None => Intrinsics::None,
            CameraModel::OpenCv => Intrinsics::Pinhole(unsafe { self.intrinsic.cv }),
            CameraModel::OpenCvFisheye => Intrinsics::Fisheye(unsafe { self.intrinsic.fisheye }),
        };
        Ok(intrinsics)
    }

    /// Sets the model id and the matching payload; words past the payload are zeroed.
    pub fn set_intrinsics(&mut self, intrinsics: Intrinsics) {
        self.intrinsic = IntrinsicUnion {
            words: [0; INTRINSIC_WORDS],
        };
        match intrinsics {
            Intrinsics::None => {}
            Intrinsics::Pinhole(cv) => self.intrinsic.cv = cv,
            Intrinsics::Fisheye(fisheye) => self.intrinsic.fisheye = fisheye,
        }
        self.camera_model = intrinsics.model() as i32;
    }

    pub fn intrinsic_words(&self) -> [u64; INTRINSIC_WORDS] {
        // SAFETY: the word view spans the whole union.
        unsafe { self.intrinsic.words }
    }

    pub fn set_intrinsic_words(&mut self, value: &[u64]) -> Result<(), CodecError> {
        self.intrinsic = IntrinsicUnion {
            words: exact("intrinsic", value)?,
        };
        Ok(())
    }

    pub fn reserved1(&self) -> [u64; 3] {
        self.reserved1
    }

    pub fn set_reserved1(&mut self, value: &[u64]) -> Result<(), CodecError> {
        self.reserved1 = exact("reserved1", value)?;
        Ok(())
    }
}

impl fmt::Debug for CameraParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CameraParameter");
        s.field("camera_model", &self.camera_model)
            .field("reserved0", &self.reserved0)
            .field("intrinsic_id", &self.intrinsic_id)
            .field("extrinsic_id", &self.extrinsic_id)
            .field("reserved1", &self.reserved1);
        match self.intrinsics() {
            Ok(intrinsics) => s.field("intrinsics", &intrinsics),
            Err(_) => s.field("intrinsic_words", &self.intrinsic_words()),
        };
        s.field("extrinsic", &self.extrinsic).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinhole() -> PinholeModel {
        PinholeModel {
            fx: 1200.5,
            fy: 1198.25,
            cx: 640.0,
            cy: 360.0,
            k1: -0.12,
            k2: 0.03,
            k3: 0.001,
            p1: 1e-4,
            p2: -2e-4,
        }
    }

    fn populated() -> CameraParameter {
        let mut param = CameraParameter::default();
        param.reserved0 = 0xdead_beef;
        param.intrinsic_id = 41;
        param.extrinsic_id = 42;
        param.set_reserved1(&[7, 8, 9]).unwrap();
        param.set_intrinsics(Intrinsics::Pinhole(pinhole()));
        param.extrinsic = CameraExtrinsic::new([0.1, 0.2, 0.3], [1.0, 2.0, 3.0]);
        param.extrinsic.set_reserved(&[u64::MAX, 0, 1, 2]).unwrap();
        param
    }

    #[test]
    fn default_has_no_model() {
        let param = CameraParameter::default();
        assert_eq!(param.camera_model().unwrap(), CameraModel::None);
        assert_eq!(param.intrinsics().unwrap(), Intrinsics::None);
        assert_eq!(param.intrinsic_words(), [0; INTRINSIC_WORDS]);
    }

    #[test]
    fn copy_is_equal_and_independent() {
        let original = populated();
        let mut copy = original;
        assert_eq!(copy, original);

        copy.intrinsic_id = 99;
        copy.set_intrinsics(Intrinsics::Fisheye(FisheyeModel::default()));
        copy.extrinsic.set_tvec(&[9.0, 9.0, 9.0]).unwrap();

        assert_eq!(original.intrinsic_id, 41);
        assert_eq!(original.intrinsics().unwrap(), Intrinsics::Pinhole(pinhole()));
        assert_eq!(original.extrinsic.tvec(), [1.0, 2.0, 3.0]);
        assert_ne!(copy, original);
    }

    #[test]
    fn reserved_fields_survive_copy() {
        let original = populated();
        let copy = original;
        assert_eq!(copy.reserved0, 0xdead_beef);
        assert_eq!(copy.reserved1(), [7, 8, 9]);
        assert_eq!(copy.extrinsic.reserved(), [u64::MAX, 0, 1, 2]);
        assert_eq!(copy.as_bytes(), original.as_bytes());
    }

    #[test]
    fn tag_and_payload_are_set_together() {
        let mut param = CameraParameter::default();
        let fisheye = FisheyeModel {
            fx: 500.0,
            k4: 0.5,
            ..FisheyeModel::default()
        };
        param.set_intrinsics(Intrinsics::Fisheye(fisheye));
        assert_eq!(param.camera_model().unwrap(), CameraModel::OpenCvFisheye);
        assert_eq!(param.intrinsics().unwrap(), Intrinsics::Fisheye(fisheye));
        assert_eq!(param.intrinsic_words()[0], 500.0f64.to_bits());
        assert_eq!(param.intrinsic_words()[8..], [0; 8]);
    }

    #[test]
    fn unknown_model_keeps_raw_words() {
        let mut param = CameraParameter::default();
        let words: Vec<u64> = (100..116).collect();
        param.set_intrinsic_words(&words).unwrap();
        param.set_raw_camera_model(17);

        assert_eq!(param.intrinsics(), Err(CodecError::UnknownCameraModel(17)));
        let copy = param;
        assert_eq!(copy.raw_camera_model(), 17);
        assert_eq!(copy.intrinsic_words().to_vec(), words);
    }

    #[test]
    fn wrong_length_leaves_fields_unchanged() {
        let mut param = populated();

        let err = param.set_reserved1(&[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidArgument {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert_eq!(param.reserved1(), [7, 8, 9]);

        let before = param.intrinsic_words();
        assert!(param.set_intrinsic_words(&[0; 15]).is_err());
        assert!(param.set_intrinsic_words(&[0; 17]).is_err());
        assert_eq!(param.intrinsic_words(), before);

        assert!(param.extrinsic.set_rvec(&[1.0; 4]).is_err());
        assert!(param.extrinsic.set_tvec(&[]).is_err());
        assert!(param.extrinsic.set_reserved(&[1; 3]).is_err());
        assert_eq!(param.extrinsic.rvec(), [0.1, 0.2, 0.3]);
        assert_eq!(param.extrinsic.tvec(), [1.0, 2.0, 3.0]);
        assert_eq!(param.extrinsic.reserved(), [u64::MAX, 0, 1, 2]);
    }

    #[test]
    fn from_native_reads_unaligned_copy() {
        let original = populated();
        let mut buf = vec![0u8; 256 + 1];
        buf[1..].copy_from_slice(original.as_bytes());

        let ptr = buf[1..].as_ptr().cast::<CameraParameter>();
        let copy = unsafe { CameraParameter::from_native(ptr) }.unwrap();
        buf.fill(0);

        assert_eq!(copy, original);
        assert!(unsafe { CameraParameter::from_native(std::ptr::null()) }.is_none());
    }
}
