use std::f64::consts::PI;

/// Uniform scale plus letterbox/pillarbox offset mapping a source viewport
/// onto a target stage: `new = scale * old + (dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomFactor {
    pub scale: f64,
    pub dx: f64,
    pub dy: f64,
}

impl ZoomFactor {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    /// Fit `source` into `target` preserving aspect ratio. Degenerate sizes
    /// yield the identity transform rather than a division error.
    pub fn fit(source: (f64, f64), target: (f64, f64)) -> Self {
        if source.0 == 0.0 || source.1 == 0.0 || target.1 == 0.0 {
            return Self::IDENTITY;
        }

        let source_aspect = source.0 / source.1;
        let target_aspect = target.0 / target.1;
        if target_aspect < source_aspect {
            // Narrower target: bars above and below.
            let scale = target.0 / source.0;
            Self {
                scale,
                dx: 0.0,
                dy: (target.1 - target.0 / source_aspect) / 2.0,
            }
        } else if target_aspect > source_aspect {
            // Wider target: bars left and right.
            let scale = target.1 / source.1;
            Self {
                scale,
                dx: (target.0 - target.1 * source_aspect) / 2.0,
                dy: 0.0,
            }
        } else {
            Self {
                scale: target.0 / source.0,
                dx: 0.0,
                dy: 0.0,
            }
        }
    }

    pub fn apply_x(&self, x: f64) -> f64 {
        self.scale * x + self.dx
    }

    pub fn apply_y(&self, y: f64) -> f64 {
        self.scale * y + self.dy
    }
}

/// Wrap degrees into (-180, 180].
pub fn wrap_angle(degrees: f64) -> f64 {
    180.0 - (180.0 - degrees).rem_euclid(360.0)
}

/// ASS-compatible decomposition of a Flash-engine rotation: projected anchor
/// point, `\frx`/`\fry`/`\frz` angles and the `\fscx`/`\fscy` percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationTransform {
    pub x: f64,
    pub y: f64,
    pub rot_x: f64,
    pub rot_y: f64,
    pub rot_z: f64,
    /// Percent, applied uniformly to both axes.
    pub scale: f64,
}

/// Convert a Flash rotation pair plus a 2-D anchor into ASS rotation angles
/// and a depth-derived scale.
///
/// The two rotations compose into an equivalent axis-angle form; the anchor
/// is pushed through a perspective transform whose field of view derives from
/// the stage width. An anchor that lands behind the camera cannot be rendered
/// as specified: the scale sign is flipped and the orientation turned 180° on
/// two axes, which is close enough in practice, and a warning is emitted.
pub fn convert_flash_rotation(
    rot_y: f64,
    rot_z: f64,
    x: f64,
    y: f64,
    stage_width: f64,
    stage_height: f64,
) -> RotationTransform {
    let mut rot_y = wrap_angle(rot_y);
    let rot_z = wrap_angle(rot_z);
    if rot_y == 90.0 || rot_y == -90.0 {
        // Avoid the projection singularity at cos(rot_y) == 0.
        rot_y -= 1.0;
    }

    let (mut out_x, mut out_y, out_z);
    let (rot_y_rad, rot_z_rad);
    if rot_y == 0.0 || rot_z == 0.0 {
        // Positive Flash angles are clockwise.
        out_x = 0.0;
        out_y = -rot_y;
        out_z = -rot_z;
        rot_y_rad = rot_y.to_radians();
        rot_z_rad = rot_z.to_radians();
    } else {
        rot_y_rad = rot_y.to_radians();
        rot_z_rad = rot_z.to_radians();
        out_y = (-rot_y_rad.sin() * rot_z_rad.cos())
            .atan2(rot_y_rad.cos())
            .to_degrees();
        out_z = (-rot_y_rad.cos() * rot_z_rad.sin())
            .atan2(rot_z_rad.cos())
            .to_degrees();
        out_x = (rot_y_rad.sin() * rot_z_rad.sin()).asin().to_degrees();
    }

    let half_width = stage_width / 2.0;
    let half_height = stage_height / 2.0;
    let mut tr_x = (x * rot_z_rad.cos() + y * rot_z_rad.sin()) / rot_y_rad.cos()
        + (1.0 - rot_z_rad.cos() / rot_y_rad.cos()) * half_width
        - rot_z_rad.sin() / rot_y_rad.cos() * half_height;
    let mut tr_y = y * rot_z_rad.cos() - x * rot_z_rad.sin()
        + rot_z_rad.sin() * half_width
        + (1.0 - rot_z_rad.cos()) * half_height;
    let tr_z = (tr_x - half_width) * rot_y_rad.sin();

    // Flash FOV, not the ASS renderer's width*4/3.
    let fov = stage_width * (2.0 * PI / 9.0).tan() / 2.0;
    let mut scale_xy = if fov + tr_z == 0.0 {
        eprintln!("[dsc] rotation puts object behind the camera: depth {tr_z:.0}");
        1.0
    } else {
        fov / (fov + tr_z)
    };
    tr_x = (tr_x - half_width) * scale_xy + half_width;
    tr_y = (tr_y - half_height) * scale_xy + half_height;
    if scale_xy < 0.0 {
        scale_xy = -scale_xy;
        out_x += 180.0;
        out_y += 180.0;
        eprintln!("[dsc] rotation puts object behind the camera: depth {tr_z:.0} < {fov:.0}");
    }

    RotationTransform {
        x: tr_x,
        y: tr_y,
        rot_x: wrap_angle(out_x),
        rot_y: wrap_angle(out_y),
        rot_z: wrap_angle(out_z),
        scale: scale_xy * 100.0,
    }
}

/// Render a 24-bit RGB color as the blue-green-red hex string ASS `\c&H..&`
/// takes. Pure black and white pass through. Below the SD threshold the
/// channels are swapped verbatim; at or above it the color goes through a
/// BT.601 to BT.709 conversion so the player shows the intended hue.
pub fn convert_color(rgb: u32, stage_width: u32, stage_height: u32) -> String {
    if rgb == 0x000000 {
        return "000000".to_owned();
    }
    if rgb == 0xFFFFFF {
        return "FFFFFF".to_owned();
    }

    let r = f64::from((rgb >> 16) & 0xFF);
    let g = f64::from((rgb >> 8) & 0xFF);
    let b = f64::from(rgb & 0xFF);
    if stage_width < 1280 && stage_height < 576 {
        format!("{:02X}{:02X}{:02X}", b as u32, g as u32, r as u32)
    } else {
        let clip = |value: f64| value.round().clamp(0.0, 255.0) as u32;
        format!(
            "{:02X}{:02X}{:02X}",
            clip(r * 0.00956384088080656 + g * 0.03217254540203729 + b * 0.95826361371715607),
            clip(r * -0.10493933142075390 + g * 1.17231478191855154 + b * -0.06737545049779757),
            clip(r * 0.91348912373987645 + g * 0.07858536372532510 + b * 0.00792551253479842),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_identity_for_matching_aspect() {
        let zoom = ZoomFactor::fit((672.0, 438.0), (1344.0, 876.0));
        assert_eq!(zoom.scale, 2.0);
        assert_eq!(zoom.dx, 0.0);
        assert_eq!(zoom.dy, 0.0);
    }

    #[test]
    fn zoom_letterboxes_narrower_target() {
        // 4:3 source onto a 1:1 target: full width, bars above and below.
        let zoom = ZoomFactor::fit((400.0, 300.0), (400.0, 400.0));
        assert_eq!(zoom.scale, 1.0);
        assert_eq!(zoom.dx, 0.0);
        assert_eq!(zoom.dy, 50.0);
    }

    #[test]
    fn zoom_pillarboxes_wider_target() {
        let zoom = ZoomFactor::fit((400.0, 300.0), (800.0, 300.0));
        assert_eq!(zoom.scale, 1.0);
        assert_eq!(zoom.dx, 200.0);
        assert_eq!(zoom.dy, 0.0);
    }

    #[test]
    fn zoom_maps_source_corners_onto_boxed_bounds() {
        let source = (672.0, 438.0);
        let target = (1920.0, 1080.0);
        let zoom = ZoomFactor::fit(source, target);

        // Corners land exactly on the pillarboxed content window.
        let left = zoom.apply_x(0.0);
        let right = zoom.apply_x(source.0);
        let top = zoom.apply_y(0.0);
        let bottom = zoom.apply_y(source.1);
        assert!((top - 0.0).abs() < 1e-9);
        assert!((bottom - target.1).abs() < 1e-9);
        assert!((left - (target.0 - right)).abs() < 1e-9);
        assert!(right <= target.0);
    }

    #[test]
    fn zoom_degenerate_source_is_identity() {
        assert_eq!(ZoomFactor::fit((0.0, 438.0), (1920.0, 1080.0)), ZoomFactor::IDENTITY);
        assert_eq!(ZoomFactor::fit((672.0, 0.0), (1920.0, 1080.0)), ZoomFactor::IDENTITY);
        assert_eq!(ZoomFactor::fit((672.0, 438.0), (1920.0, 0.0)), ZoomFactor::IDENTITY);
    }

    #[test]
    fn wrap_angle_lands_in_half_open_range() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(180.0), 180.0);
        assert_eq!(wrap_angle(-180.0), 180.0);
        assert_eq!(wrap_angle(270.0), -90.0);
        assert_eq!(wrap_angle(540.0), 180.0);
        assert_eq!(wrap_angle(-90.0), -90.0);
    }

    #[test]
    fn no_rotation_is_pass_through() {
        let transform = convert_flash_rotation(0.0, 0.0, 100.0, 50.0, 1920.0, 1080.0);
        assert!((transform.x - 100.0).abs() < 1e-9);
        assert!((transform.y - 50.0).abs() < 1e-9);
        assert_eq!(transform.rot_x, 0.0);
        assert_eq!(transform.rot_y, 0.0);
        assert_eq!(transform.rot_z, 0.0);
        assert!((transform.scale - 100.0).abs() < 1e-9);
    }

    #[test]
    fn pure_z_rotation_maps_to_negated_frz() {
        let transform = convert_flash_rotation(0.0, 30.0, 0.0, 0.0, 1920.0, 1080.0);
        assert_eq!(transform.rot_z, -30.0);
        assert_eq!(transform.rot_x, 0.0);
        assert_eq!(transform.rot_y, 0.0);
    }

    #[test]
    fn behind_camera_scale_is_flipped_positive() {
        // rot_y at the nudged singularity throws a left-edge anchor far behind
        // the camera; the transform must come back positive and turned around.
        let transform = convert_flash_rotation(90.0, 0.0, 0.0, 0.0, 1920.0, 1080.0);
        assert!(transform.scale > 0.0);
        assert_eq!(transform.rot_x, 180.0);
    }

    #[test]
    fn color_black_and_white_pass_through() {
        assert_eq!(convert_color(0x000000, 1920, 1080), "000000");
        assert_eq!(convert_color(0xFFFFFF, 640, 480), "FFFFFF");
    }

    #[test]
    fn color_swaps_channels_below_sd_threshold() {
        assert_eq!(convert_color(0x123456, 640, 480), "563412");
    }

    #[test]
    fn color_converts_colorspace_at_or_above_sd_threshold() {
        // Pure red through the BT.601->BT.709 matrix: green clips to zero.
        assert_eq!(convert_color(0xFF0000, 1920, 1080), "0200E9");
    }
}
