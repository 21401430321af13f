//
// orientation.rs
// Nifti2Dicom-rs
//
// Anatomical orientation codes: validation of the 49 accepted values, detection from a direction
// matrix, and axis permutation/flip of a volume towards a requested code.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::str::FromStr;

use ndarray::Axis;

use crate::error::{ConvertError, Result, Stage};
use crate::volume::{Geometry, Volume};

/// Value of `--reorient` that leaves the volume untouched.
pub const NO_REORIENT: &str = "NONE";

/// Side of the patient an index axis starts from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Anatomy {
    Right,
    Left,
    Anterior,
    Posterior,
    Inferior,
    Superior,
}

impl Anatomy {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'R' => Some(Anatomy::Right),
            'L' => Some(Anatomy::Left),
            'A' => Some(Anatomy::Anterior),
            'P' => Some(Anatomy::Posterior),
            'I' => Some(Anatomy::Inferior),
            'S' => Some(Anatomy::Superior),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Anatomy::Right => 'R',
            Anatomy::Left => 'L',
            Anatomy::Anterior => 'A',
            Anatomy::Posterior => 'P',
            Anatomy::Inferior => 'I',
            Anatomy::Superior => 'S',
        }
    }

    /// LPS axis this side lies on (0 = x, 1 = y, 2 = z).
    pub fn physical_axis(self) -> usize {
        match self {
            Anatomy::Right | Anatomy::Left => 0,
            Anatomy::Anterior | Anatomy::Posterior => 1,
            Anatomy::Inferior | Anatomy::Superior => 2,
        }
    }

    fn from_axis(physical_axis: usize, positive: bool) -> Self {
        match (physical_axis, positive) {
            (0, true) => Anatomy::Right,
            (0, false) => Anatomy::Left,
            (1, true) => Anatomy::Anterior,
            (1, false) => Anatomy::Posterior,
            (_, true) => Anatomy::Inferior,
            (_, false) => Anatomy::Superior,
        }
    }
}

/// A 3-letter orientation code such as `RAI`, one letter per index axis.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OrientationCode([Anatomy; 3]);

impl OrientationCode {
    /// Detect the closest axis-aligned code for a direction matrix.
    ///
    /// Axes are assigned greedily, largest cosine first, so oblique volumes still get three
    /// distinct physical axes.
    pub fn from_direction(direction: &[[f64; 3]; 3]) -> Result<Self> {
        let mut used_rows = [false; 3];
        let mut used_cols = [false; 3];
        let mut axes = [None; 3];

        for _ in 0..3 {
            let mut best: Option<(usize, usize, f64)> = None;
            for row in (0..3).filter(|r| !used_rows[*r]) {
                for col in (0..3).filter(|c| !used_cols[*c]) {
                    let magnitude = direction[row][col].abs();
                    if magnitude > best.map_or(0.0, |(_, _, m)| m) {
                        best = Some((row, col, magnitude));
                    }
                }
            }
            let (row, col, _) = best.ok_or_else(|| {
                ConvertError::stage(
                    Stage::Orient,
                    "OrientationCode::from_direction",
                    format!("degenerate direction matrix {:?}", direction),
                )
            })?;
            used_rows[row] = true;
            used_cols[col] = true;
            axes[col] = Some(Anatomy::from_axis(row, direction[row][col] > 0.0));
        }

        match axes {
            [Some(a), Some(b), Some(c)] => Ok(OrientationCode([a, b, c])),
            _ => Err(ConvertError::stage(
                Stage::Orient,
                "OrientationCode::from_direction",
                "direction matrix does not span three axes",
            )),
        }
    }

    fn all() -> Vec<Self> {
        const PERMUTATIONS: [[usize; 3]; 6] =
            [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let mut codes = Vec::with_capacity(48);
        for perm in PERMUTATIONS {
            for signs in 0..8u8 {
                let axis = |slot: usize| Anatomy::from_axis(perm[slot], signs & (1 << slot) == 0);
                codes.push(OrientationCode([axis(0), axis(1), axis(2)]));
            }
        }
        codes
    }
}

impl FromStr for OrientationCode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConvertError::InvalidOrientation(s.to_string());
        let letters: Vec<char> = s.chars().collect();
        if letters.len() != 3 {
            return Err(invalid());
        }
        let mut axes = [Anatomy::Right; 3];
        let mut seen = [false; 3];
        for (slot, letter) in letters.into_iter().enumerate() {
            let anatomy = Anatomy::from_letter(letter).ok_or_else(invalid)?;
            let physical = anatomy.physical_axis();
            if seen[physical] {
                return Err(invalid());
            }
            seen[physical] = true;
            axes[slot] = anatomy;
        }
        Ok(OrientationCode(axes))
    }
}

impl fmt::Display for OrientationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for anatomy in self.0 {
            write!(f, "{}", anatomy.letter())?;
        }
        Ok(())
    }
}

/// Requested orientation: one of the 48 codes, or leave the volume as it is.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Orientation {
    Keep,
    Code(OrientationCode),
}

impl Orientation {
    pub fn parse(value: &str) -> Result<Self> {
        if value == NO_REORIENT {
            return Ok(Orientation::Keep);
        }
        value.parse().map(Orientation::Code)
    }

    pub fn all_codes() -> Vec<OrientationCode> {
        OrientationCode::all()
    }

    /// Every string accepted by [`Orientation::parse`].
    pub fn accepted_values() -> Vec<String> {
        let mut values: Vec<String> = Self::all_codes().iter().map(|c| c.to_string()).collect();
        values.push(NO_REORIENT.to_string());
        values
    }
}

/// Permute and flip `volume` so its index axes follow `target`.
///
/// Only axis-aligned transforms are applied; voxels are moved, never interpolated.
pub fn reorient<T: Clone>(volume: &Volume<T>, target: OrientationCode) -> Result<Volume<T>> {
    let current = OrientationCode::from_direction(&volume.geometry.direction)?;
    let mut perm = [0usize; 3];
    let mut flip = [false; 3];

    for (slot, wanted) in target.0.iter().enumerate() {
        let source = current
            .0
            .iter()
            .position(|a| a.physical_axis() == wanted.physical_axis())
            .ok_or_else(|| {
                ConvertError::stage(
                    Stage::Orient,
                    "orientation::reorient",
                    format!("cannot map {} onto {}", current, target),
                )
            })?;
        perm[slot] = source;
        flip[slot] = current.0[source] != *wanted;
    }

    let mut view = volume.data.view().permuted_axes(perm);
    for (slot, flipped) in flip.iter().enumerate() {
        if *flipped {
            view.invert_axis(Axis(slot));
        }
    }
    let data = view.as_standard_layout().into_owned();

    let old = &volume.geometry;
    let old_dims = volume.dims();
    let mut corner = [0usize; 3];
    let mut geometry = Geometry {
        spacing: [0.0; 3],
        origin: [0.0; 3],
        direction: [[0.0; 3]; 3],
    };
    for slot in 0..3 {
        let source = perm[slot];
        let sign = if flip[slot] { -1.0 } else { 1.0 };
        geometry.spacing[slot] = old.spacing[source];
        for row in 0..3 {
            geometry.direction[row][slot] = old.direction[row][source] * sign;
        }
        if flip[slot] {
            corner[source] = old_dims[source].saturating_sub(1);
        }
    }
    geometry.origin = old.index_to_physical(corner);

    Ok(Volume::new(data, geometry))
}

/// Patient Orientation (0020,0020) for the row and column directions of a k-slice.
pub fn patient_orientation(geometry: &Geometry) -> String {
    format!(
        "{}\\{}",
        direction_letters(geometry.axis_direction(0)),
        direction_letters(geometry.axis_direction(1))
    )
}

fn direction_letters(direction: [f64; 3]) -> String {
    let mut parts: Vec<(f64, char)> = direction
        .iter()
        .enumerate()
        .filter(|(_, v)| v.abs() > 1e-4)
        .map(|(axis, v)| {
            let letter = match (axis, *v > 0.0) {
                (0, true) => 'L',
                (0, false) => 'R',
                (1, true) => 'P',
                (1, false) => 'A',
                (_, true) => 'H',
                (_, false) => 'F',
            };
            (v.abs(), letter)
        })
        .collect();
    parts.sort_by(|a, b| b.0.total_cmp(&a.0));
    parts.into_iter().map(|(_, letter)| letter).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::collections::HashSet;

    fn lpi_volume() -> Volume<u16> {
        let data = Array3::from_shape_fn((3, 2, 2), |(i, j, k)| (i + 10 * j + 100 * k) as u16);
        let geometry = Geometry {
            spacing: [1.0, 2.0, 3.0],
            origin: [5.0, 6.0, 7.0],
            direction: [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
        };
        Volume::new(data, geometry)
    }

    #[test]
    fn accepts_exactly_forty_nine_values() {
        let values = Orientation::accepted_values();
        assert_eq!(values.len(), 49);
        let unique: HashSet<_> = values.iter().collect();
        assert_eq!(unique.len(), 49);
        for value in &values {
            assert!(Orientation::parse(value).is_ok(), "{value} should parse");
        }
        assert_eq!(Orientation::parse("NONE").unwrap(), Orientation::Keep);
    }

    #[test]
    fn rejects_everything_else() {
        for value in ["", "rai", "RA", "RAIS", "RRI", "RLA", "XYZ", "none", "R A", "RAÍ"] {
            match Orientation::parse(value) {
                Err(ConvertError::InvalidOrientation(v)) => assert_eq!(v, value),
                other => panic!("{value:?} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn detects_codes_from_direction() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(OrientationCode::from_direction(&identity).unwrap().to_string(), "RAI");

        let lpi = lpi_volume().geometry.direction;
        assert_eq!(OrientationCode::from_direction(&lpi).unwrap().to_string(), "LPI");

        // Axial slices stored sagittally: i runs A->P, j runs I->S, k runs R->L.
        let swapped = [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert_eq!(OrientationCode::from_direction(&swapped).unwrap().to_string(), "AIR");
    }

    #[test]
    fn degenerate_direction_fails() {
        let zero = [[0.0; 3]; 3];
        assert!(matches!(
            OrientationCode::from_direction(&zero),
            Err(ConvertError::Stage { stage: Stage::Orient, .. })
        ));
    }

    #[test]
    fn reorient_to_current_code_is_identity() {
        let volume = lpi_volume();
        let out = reorient(&volume, "LPI".parse().unwrap()).unwrap();
        assert_eq!(out.data, volume.data);
        assert_eq!(out.geometry, volume.geometry);
    }

    #[test]
    fn lpi_to_rai_flips_i_and_j() {
        let volume = lpi_volume();
        let out = reorient(&volume, "RAI".parse().unwrap()).unwrap();

        assert_eq!(out.dims(), [3, 2, 2]);
        assert_eq!(out.data[[0, 0, 0]], volume.data[[2, 1, 0]]);
        assert_eq!(out.data[[2, 1, 1]], volume.data[[0, 0, 1]]);
        assert_eq!(
            out.geometry.direction,
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        );
        // Old voxel (2, 1, 0) sits at (5 - 2, 6 - 2, 7).
        assert_eq!(out.geometry.origin, [3.0, 4.0, 7.0]);
        assert_eq!(patient_orientation(&out.geometry), "L\\P");
    }

    #[test]
    fn permutation_moves_spacing_with_axes() {
        let volume = lpi_volume();
        let out = reorient(&volume, "IRA".parse().unwrap()).unwrap();
        assert_eq!(out.dims(), [2, 3, 2]);
        assert_eq!(out.geometry.spacing, [3.0, 1.0, 2.0]);
        assert_eq!(out.data[[1, 0, 0]], volume.data[[2, 1, 1]]);
        // Physical position of a voxel is preserved by the transform.
        let before = volume.geometry.index_to_physical([2, 1, 1]);
        let after = out.geometry.index_to_physical([1, 0, 0]);
        for axis in 0..3 {
            assert!((before[axis] - after[axis]).abs() < 1e-9);
        }
    }
}
