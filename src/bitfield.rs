//! A peer's piece-availability bitfield: MSB-first within each byte.

#[derive(Debug, Clone)]
pub struct Bitfield {
    bytes: Vec<u8>,
    num_pieces: usize,
}

impl Bitfield {
    /// An all-zero bitfield for `num_pieces` pieces (used when a peer skips
    /// sending one after the handshake, per `spec.md` §4.E).
    pub fn empty(num_pieces: usize) -> Self {
        let len = num_pieces.div_ceil(8);
        Self {
            bytes: vec![0u8; len],
            num_pieces,
        }
    }

    /// Builds a bitfield from a raw `bitfield` message payload.
    pub fn from_payload(bytes: Vec<u8>, num_pieces: usize) -> Self {
        Self { bytes, num_pieces }
    }

    pub fn set_piece(&mut self, piece_index: usize) {
        let byte_i = piece_index / 8;
        let bit_i = piece_index % 8;
        if byte_i < self.bytes.len() {
            self.bytes[byte_i] |= 0b1000_0000 >> bit_i;
        }
    }

    pub fn has_piece(&self, piece_index: usize) -> bool {
        let byte_i = piece_index / 8;
        let bit_i = piece_index % 8;
        match self.bytes.get(byte_i) {
            Some(byte) => byte & (0b1000_0000 >> bit_i) != 0,
            None => false,
        }
    }

    pub fn pieces(&self) -> impl Iterator<Item = usize> + '_ {
        let num_pieces = self.num_pieces;
        self.bytes.iter().enumerate().flat_map(move |(byte_i, byte)| {
            (0..8).filter_map(move |bit_i| {
                let piece_i = byte_i * 8 + bit_i;
                if piece_i >= num_pieces {
                    return None;
                }
                let mask = 0b1000_0000 >> bit_i;
                (byte & mask != 0).then_some(piece_i)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S7
    #[test]
    fn bitfield_msb_first() {
        let bf = Bitfield::from_payload(vec![0xE0], 4);
        assert!(bf.has_piece(0));
        assert!(bf.has_piece(1));
        assert!(bf.has_piece(2));
        assert!(!bf.has_piece(3));
    }

    #[test]
    fn set_then_has() {
        let mut bf = Bitfield::empty(20);
        bf.set_piece(14);
        assert!(bf.has_piece(14));
        assert!(!bf.has_piece(13));
    }

    #[test]
    fn pieces_iterator_stops_at_num_pieces() {
        let bf = Bitfield::from_payload(vec![0xFF], 5);
        assert_eq!(bf.pieces().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_bit_is_not_held() {
        let bf = Bitfield::empty(3);
        assert!(!bf.has_piece(100));
    }
}
