//! Virtual Boy cartridge (game pak) loading.
//!
//! A game pak image must be a power of two between 256 bytes and 16 MiB.
//! The ROM window in the address map is 16 MiB wide and the hardware mirrors
//! whatever is plugged in across it, so images smaller than 64 KiB are
//! mirrored up to 64 KiB at load time and everything beyond that is handled
//! with an address mask instead of bounds checks.
//!
//! The game pak header lives in the last 544 bytes of the image (mapped at
//! 0xFFFFFDE0 in CPU space, right below the exception vectors).

use crate::VbError;

/// Offset of the header block from the end of the image.
const HEADER_FROM_END: usize = 544;

/// Parsed game pak header fields, for frontends that want to display them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartHeader {
    /// Game title (up to 20 bytes, trailing spaces/NULs trimmed)
    pub title: String,
    /// Maker code
    pub maker_code: u16,
    /// Game code
    pub game_code: u32,
    /// ROM version
    pub version: u8,
}

/// A loaded game pak: ROM contents plus the mirroring mask.
#[derive(Debug, Clone)]
pub struct Cartridge {
    /// ROM data, mirrored up to at least 64 KiB
    rom: Vec<u8>,
    /// Address mask; `mask + 1` is the mirrored image size (power of two)
    mask: u32,
    header: CartHeader,
}

impl Cartridge {
    /// Validate and load a game pak image.
    ///
    /// Fails with [`VbError::BadRomSize`] before any state is touched if the
    /// image size is not a power of two or lies outside [256 B, 16 MiB].
    pub fn load(data: &[u8]) -> Result<Self, VbError> {
        let size = data.len();
        if size < 256 || size > (1 << 24) || !size.is_power_of_two() {
            return Err(VbError::BadRomSize { size });
        }

        // Mirror images smaller than 64 KiB up to 64 KiB; the mask covers
        // the rest of the 16 MiB window.
        let mirrored = size.max(65536);
        let mut rom = vec![0u8; mirrored];
        for chunk in rom.chunks_exact_mut(size) {
            chunk.copy_from_slice(data);
        }

        let header = parse_header(data);

        Ok(Self {
            rom,
            mask: (mirrored - 1) as u32,
            header,
        })
    }

    #[inline]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn header(&self) -> &CartHeader {
        &self.header
    }

    #[inline]
    pub fn read8(&self, addr: u32) -> u8 {
        self.rom[(addr & self.mask) as usize]
    }

    #[inline]
    pub fn read16(&self, addr: u32) -> u16 {
        let a = (addr & self.mask & !1) as usize;
        u16::from_le_bytes([self.rom[a], self.rom[a + 1]])
    }
}

fn parse_header(data: &[u8]) -> CartHeader {
    // Images smaller than the header block simply have no meaningful header.
    if data.len() < HEADER_FROM_END {
        return CartHeader {
            title: String::new(),
            maker_code: 0,
            game_code: 0,
            version: 0,
        };
    }

    let h = &data[data.len() - HEADER_FROM_END..];
    let title = h[..20]
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
        .collect::<String>()
        .trim_end()
        .to_string();

    CartHeader {
        title,
        maker_code: u16::from_le_bytes([h[0x19], h[0x1A]]),
        game_code: u32::from_le_bytes([h[0x1B], h[0x1C], h[0x1D], h[0x1E]]),
        version: h[0x1F],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_power_of_two() {
        let data = vec![0u8; 300000];
        assert!(matches!(
            Cartridge::load(&data),
            Err(VbError::BadRomSize { size: 300000 })
        ));
    }

    #[test]
    fn test_rejects_too_small() {
        let data = vec![0u8; 128];
        assert!(Cartridge::load(&data).is_err());
    }

    #[test]
    fn test_rejects_too_large() {
        let data = vec![0u8; 1 << 25];
        assert!(Cartridge::load(&data).is_err());
    }

    #[test]
    fn test_accepts_bounds() {
        assert!(Cartridge::load(&vec![0u8; 256]).is_ok());
        assert!(Cartridge::load(&vec![0u8; 1 << 24]).is_ok());
    }

    #[test]
    fn test_small_image_mirrored_to_64k() {
        let mut data = vec![0u8; 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let cart = Cartridge::load(&data).unwrap();
        assert_eq!(cart.mask(), 0xFFFF);

        // Every mirror of the image within the 64 KiB window reads the same.
        for k in 0..1024u32 {
            let expected = cart.read8(k);
            let mut offset = k + 1024;
            while offset < 65536 {
                assert_eq!(cart.read8(offset), expected, "mirror mismatch at {}", offset);
                offset += 1024;
            }
        }
    }

    #[test]
    fn test_large_image_mask() {
        let data = vec![0u8; 1 << 20];
        let cart = Cartridge::load(&data).unwrap();
        assert_eq!(cart.mask(), (1 << 20) - 1);
    }

    #[test]
    fn test_read16_little_endian() {
        let mut data = vec![0u8; 256];
        data[0x10] = 0x34;
        data[0x11] = 0x12;
        let cart = Cartridge::load(&data).unwrap();
        assert_eq!(cart.read16(0x10), 0x1234);
        // Misaligned access is forced to the halfword boundary.
        assert_eq!(cart.read16(0x11), 0x1234);
    }

    #[test]
    fn test_header_parsing() {
        let mut data = vec![0u8; 65536];
        let base = data.len() - 544;
        data[base..base + 10].copy_from_slice(b"TEST TITLE");
        for b in &mut data[base + 10..base + 20] {
            *b = b' ';
        }
        data[base + 0x19] = 0xCD;
        data[base + 0x1A] = 0xAB;
        data[base + 0x1B..base + 0x1F].copy_from_slice(&[0x78, 0x56, 0x34, 0x12]);
        data[base + 0x1F] = 3;

        let cart = Cartridge::load(&data).unwrap();
        assert_eq!(cart.header().title, "TEST TITLE");
        assert_eq!(cart.header().maker_code, 0xABCD);
        assert_eq!(cart.header().game_code, 0x12345678);
        assert_eq!(cart.header().version, 3);
    }
}
