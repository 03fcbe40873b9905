//! Compositor Path Resolver
//!
//! The multi-layer compositor (MLC) has one sub-frame group per read pipe
//! and a z-ordered path array. Path slot 0 belongs to the background, so a
//! pipe's blend input sits one slot above its hardware index.

use tracing::trace;

use crate::error::{G2dError, Result};
use crate::regs::*;
use crate::request::{BlendMode, ColorKey, Layer, PorterDuff};

/// Register image of one sub-frame group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subframe {
    pub ctrl: u32,
    pub pos: u32,
    pub size: u32,
    pub alpha: u32,
    pub color_key: Option<ColorKey>,
}

impl Subframe {
    const DISABLED: Subframe = Subframe {
        ctrl: SUBFRAME_DISABLED,
        pos: 0,
        size: 0,
        alpha: 0,
        color_key: None,
    };

    pub fn is_enabled(&self) -> bool {
        self.ctrl & SUBFRAME_ENABLE != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlcState {
    pub subframes: [Subframe; MLC_LAYER_COUNT],
    pub paths: [u32; MLC_PATH_COUNT],
    pub background: Option<u32>,
    pub porter_duff: Option<PorterDuff>,
    pub out_size: u32,
}

impl MlcState {
    fn cleared(width: u32, height: u32) -> Self {
        Self {
            subframes: [Subframe::DISABLED; MLC_LAYER_COUNT],
            paths: [PATH_DISABLED; MLC_PATH_COUNT],
            background: None,
            porter_duff: None,
            out_size: pack_size(width, height),
        }
    }
}

/// Wire enabled layers into the compositor for a `width` x `height` canvas.
pub fn resolve(
    layers: &[Layer],
    background: Option<u32>,
    porter_duff: Option<PorterDuff>,
    width: u32,
    height: u32,
) -> Result<MlcState> {
    let mut state = MlcState::cleared(width, height);
    state.background = background;

    for layer in layers.iter().filter(|l| l.enabled) {
        let hwid = layer.plane as usize;
        let z = layer.zpos as usize;
        if hwid >= MLC_LAYER_COUNT || z >= MLC_PATH_COUNT {
            return Err(G2dError::LayerIndex { layer: hwid, zpos: z });
        }

        state.paths[z] = PATH_LAYER_OUT.insert(state.paths[z], hwid as u32);
        let blend_slot = hwid + 1;
        state.paths[blend_slot] = PATH_ALPHA_BLD.insert(state.paths[blend_slot], hwid as u32);

        let mut ctrl = match layer.blend {
            BlendMode::None => SUBFRAME_GLOBAL_ALPHA,
            BlendMode::Premultiplied => {
                state.paths[blend_slot] |= PATH_PMA_EN;
                0
            }
            BlendMode::Coverage => 0,
        };
        if layer.color_key.is_some() {
            ctrl |= SUBFRAME_COLORKEY;
        }

        state.subframes[hwid] = Subframe {
            ctrl: ctrl | SUBFRAME_ENABLE,
            pos: pack_pos(layer.dst.x, layer.dst.y),
            size: pack_size(layer.dst.w, layer.dst.h),
            alpha: layer.alpha as u32,
            color_key: layer.color_key,
        };
    }

    if let Some(pd) = porter_duff {
        for plane in [pd.src_plane, pd.dst_plane] {
            let enabled = state
                .subframes
                .get(plane as usize)
                .is_some_and(Subframe::is_enabled);
            if !enabled {
                return Err(G2dError::InvalidGeometry(format!(
                    "porter-duff operand plane {} is not an enabled layer",
                    plane
                )));
            }
        }
        state.porter_duff = Some(pd);
    }

    Ok(state)
}

/// Queue the compositor writes. Each sub-frame's control word goes last so
/// the layer is enabled only once its geometry is in place.
pub fn program(state: &MlcState, out: &mut Vec<RegWrite>) {
    out.push(RegWrite::new(MLC_OUT_SIZE, state.out_size));
    out.push(RegWrite::new(MLC_BG_COLOR, state.background.unwrap_or(0)));

    for (n, sf) in state.subframes.iter().enumerate() {
        if sf.is_enabled() {
            out.push(RegWrite::new(mlc_layer(n, MLC_L_POS), sf.pos));
            out.push(RegWrite::new(mlc_layer(n, MLC_L_SIZE), sf.size));
            out.push(RegWrite::new(mlc_layer(n, MLC_L_ALPHA), sf.alpha));
            if let Some(key) = sf.color_key {
                out.push(RegWrite::new(mlc_layer(n, MLC_L_CKEY_MIN), key.min));
                out.push(RegWrite::new(mlc_layer(n, MLC_L_CKEY_MAX), key.max));
            }
        }
        out.push(RegWrite::new(mlc_layer(n, MLC_L_CTRL), sf.ctrl));
    }

    for (z, &path) in state.paths.iter().enumerate() {
        out.push(RegWrite::new(mlc_path(z), path));
    }

    let pd = match state.porter_duff {
        Some(pd) => {
            PD_ENABLE
                | PD_SRC.encode(pd.src_plane as u32)
                | PD_DST.encode(pd.dst_plane as u32)
                | PD_MODE.encode(pd.mode as u32)
        }
        None => 0,
    };
    out.push(RegWrite::new(MLC_PD_CTRL, pd));

    let mut ctrl = MLC_CTRL_ENABLE;
    if state.background.is_some() {
        ctrl |= MLC_CTRL_BG_ENABLE;
    }
    out.push(RegWrite::new(MLC_CTRL, ctrl));
    trace!("mlc paths {:08X?}", state.paths);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Fourcc;
    use crate::request::{PdMode, Rect};

    fn layer(plane: u8, zpos: u8) -> Layer {
        let full = Rect::new(0, 0, 1920, 1080);
        let mut l = Layer::new(plane, Fourcc::XRGB8888, full, full);
        l.zpos = zpos;
        l
    }

    #[test]
    fn test_single_layer_wiring() {
        let state = resolve(&[layer(0, 0)], None, None, 1920, 1080).unwrap();
        let sf = state.subframes[0];
        assert_eq!(sf.ctrl, SUBFRAME_ENABLE | SUBFRAME_GLOBAL_ALPHA);
        assert_eq!(sf.size, pack_size(1920, 1080));
        assert_eq!(PATH_LAYER_OUT.decode(state.paths[0]), 0);
        assert_eq!(PATH_ALPHA_BLD.decode(state.paths[1]), 0);
        assert!(state.subframes[1..].iter().all(|s| s.ctrl == SUBFRAME_DISABLED));
        assert!(state.paths[2..].iter().all(|&p| p == PATH_DISABLED));
    }

    #[test]
    fn test_blend_modes() {
        let mut premult = layer(1, 0);
        premult.blend = BlendMode::Premultiplied;
        let mut coverage = layer(3, 1);
        coverage.blend = BlendMode::Coverage;
        let state = resolve(&[premult, coverage], None, None, 1920, 1080).unwrap();

        assert_eq!(state.subframes[1].ctrl, SUBFRAME_ENABLE);
        assert_ne!(state.paths[2] & PATH_PMA_EN, 0);
        assert_eq!(state.subframes[3].ctrl, SUBFRAME_ENABLE);
        assert_eq!(state.paths[4] & PATH_PMA_EN, 0);
        assert_eq!(PATH_LAYER_OUT.decode(state.paths[0]), 1);
        assert_eq!(PATH_LAYER_OUT.decode(state.paths[1]), 3);
    }

    #[test]
    fn test_index_limits() {
        assert_eq!(
            resolve(&[layer(5, 0)], None, None, 64, 64),
            Err(G2dError::LayerIndex { layer: 5, zpos: 0 })
        );
        assert_eq!(
            resolve(&[layer(0, 6)], None, None, 64, 64),
            Err(G2dError::LayerIndex { layer: 0, zpos: 6 })
        );
        assert!(resolve(&[layer(4, 5)], None, None, 64, 64).is_ok());
    }

    #[test]
    fn test_disabled_layers_are_skipped() {
        let mut off = layer(0, 0);
        off.enabled = false;
        let state = resolve(&[off], Some(0xFF00_0000), None, 64, 64).unwrap();
        assert!(!state.subframes[0].is_enabled());
        assert_eq!(state.paths, [PATH_DISABLED; MLC_PATH_COUNT]);
    }

    #[test]
    fn test_enable_written_after_geometry() {
        let state = resolve(&[layer(0, 0)], None, None, 64, 64).unwrap();
        let mut out = Vec::new();
        program(&state, &mut out);
        let pos = out.iter().position(|w| w.offset == mlc_layer(0, MLC_L_POS)).unwrap();
        let ctrl = out.iter().position(|w| w.offset == mlc_layer(0, MLC_L_CTRL)).unwrap();
        assert!(pos < ctrl);
    }

    #[test]
    fn test_porter_duff_needs_enabled_operands() {
        let pd = PorterDuff {
            src_plane: 0,
            dst_plane: 1,
            mode: PdMode::SrcOver,
        };
        assert!(resolve(&[layer(0, 0)], None, Some(pd), 64, 64).is_err());

        let state = resolve(&[layer(0, 0), layer(1, 1)], None, Some(pd), 64, 64).unwrap();
        let mut out = Vec::new();
        program(&state, &mut out);
        let word = out.iter().find(|w| w.offset == MLC_PD_CTRL).unwrap().value;
        assert_eq!(PD_MODE.decode(word), PdMode::SrcOver as u32);
        assert_ne!(word & PD_ENABLE, 0);
    }

    #[test]
    fn test_color_key_programs_range() {
        let mut keyed = layer(0, 0);
        keyed.color_key = Some(ColorKey {
            min: 0x0000_00F0,
            max: 0x0000_00FF,
        });
        let state = resolve(&[keyed], None, None, 64, 64).unwrap();
        assert_ne!(state.subframes[0].ctrl & SUBFRAME_COLORKEY, 0);
        let mut out = Vec::new();
        program(&state, &mut out);
        assert!(out.contains(&RegWrite::new(mlc_layer(0, MLC_L_CKEY_MAX), 0xFF)));
    }
}
