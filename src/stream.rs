//! Streaming buffer state machine.
//!
//! An explicit state enum drives a single `step`-style method the caller
//! re-invokes, generalized to the init/load/flush cycle the compressor needs
//! plus the "created" terminal state between frames.

use crate::block::{as_rle, BlockHeader, BlockType};
use crate::context::CCtx;
use crate::error::Res;
use crate::frame::{checksum_trailer, write_frame_header, FrameDescriptor, FrameHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDirective {
    Continue,
    Flush,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Init,
    Load,
    Flush,
}

/// Streaming compressor. Owns a [`CCtx`] plus the in/out
/// ring-style buffers the FSM copies through.
pub struct StreamingEncoder {
    ctx: CCtx,
    state: State,
    in_buf: Vec<u8>,
    in_target: usize,
    out_buf: Vec<u8>,
    out_pos: usize,
    pledged_size: Option<u64>,
    emitted_any_block: bool,
}

impl StreamingEncoder {
    pub fn new(ctx: CCtx, pledged_size: Option<u64>) -> Self {
        let block_size = crate::block::BLOCKSIZE_MAX;
        StreamingEncoder {
            ctx,
            state: State::Created,
            in_buf: Vec::with_capacity(block_size),
            in_target: block_size,
            out_buf: Vec::new(),
            out_pos: 0,
            pledged_size,
            emitted_any_block: false,
        }
    }

    /// `compressStream2(out, in, endDirective)`: drains as much of `input`
    /// as the current state allows, writes compressed bytes into `output`,
    /// and returns a hint of bytes still wanted (0 once the frame is fully
    /// flushed under `EndDirective::End`).
    pub fn compress_stream2(
        &mut self,
        output: &mut Vec<u8>,
        input: &mut &[u8],
        end_directive: EndDirective,
    ) -> Res<usize> {
        if self.state == State::Created {
            self.begin_frame(output)?;
            self.state = State::Init;
        }

        if self.state == State::Init {
            self.state = State::Load;
        }

        loop {
            match self.state {
                State::Load => {
                    let want = self.in_target - self.in_buf.len();
                    let take = want.min(input.len());
                    self.in_buf.extend_from_slice(&input[..take]);
                    *input = &input[take..];

                    let in_buf_full = self.in_buf.len() == self.in_target;
                    let flush_partial = end_directive != EndDirective::Continue && !self.in_buf.is_empty();

                    if !in_buf_full && !flush_partial {
                        return Ok(self.in_target - self.in_buf.len());
                    }

                    self.compress_one_block(end_directive == EndDirective::End && input.is_empty())?;
                    self.state = State::Flush;
                }
                State::Flush => {
                    output.extend_from_slice(&self.out_buf[self.out_pos..]);
                    self.out_pos = self.out_buf.len();

                    if self.in_buf.is_empty() && input.is_empty() && end_directive == EndDirective::End {
                        self.finish_frame(output)?;
                        self.state = State::Created;
                        return Ok(0);
                    }
                    self.state = State::Load;
                    if input.is_empty() && self.in_buf.is_empty() {
                        return Ok(self.in_target);
                    }
                }
                State::Created | State::Init => unreachable!("handled above"),
            }
        }
    }

    fn begin_frame(&mut self, output: &mut Vec<u8>) -> Res<()> {
        log::debug!("beginning frame, pledged size {:?}", self.pledged_size);
        self.ctx.reset_stream();
        self.emitted_any_block = false;
        let single_segment = self.pledged_size.is_some()
            && self.pledged_size.unwrap() <= (1u64 << self.ctx.params.c_params.window_log);
        let fcs_code = match self.pledged_size {
            None => 0,
            Some(s) if s < 256 && single_segment => 0,
            Some(s) if s <= 0xFFFF + 256 => 1,
            Some(s) if s <= u32::MAX as u64 => 2,
            _ => 3,
        };
        let header = FrameHeader {
            descriptor: FrameDescriptor {
                dict_id_size: 0,
                checksum_flag: self.ctx.params.checksum_flag,
                single_segment,
                fcs_code,
            },
            window_log: if single_segment { None } else { Some(self.ctx.params.c_params.window_log) },
            dict_id: None,
            content_size: if self.ctx.params.content_size_flag { self.pledged_size } else { None },
        };
        write_frame_header(&header, output);
        Ok(())
    }

    fn compress_one_block(&mut self, is_last: bool) -> Res<()> {
        self.out_buf.clear();
        self.out_pos = 0;

        let src = std::mem::take(&mut self.in_buf);
        self.in_buf = Vec::with_capacity(self.in_target);

        if src.is_empty() && !is_last {
            return Ok(());
        }

        if let Some(byte) = as_rle(&src) {
            if !src.is_empty() {
                log::debug!("emitting {} byte block as RLE({:#04x})", src.len(), byte);
                let header = BlockHeader { last_block: is_last, block_type: BlockType::Rle, block_size: src.len() as u32 };
                self.out_buf.extend_from_slice(&header.encode());
                self.out_buf.push(byte);
                if let Some(hasher) = &mut self.ctx.checksum {
                    hasher.update(&src);
                }
                self.emitted_any_block = true;
                if is_last {
                    self.emit_final_empty_if_needed();
                }
                return Ok(());
            }
        }

        let body = self.ctx.compress_block(&src)?;
        match body {
            Some(compressed) => {
                log::debug!("block compressed {} bytes into {} bytes", src.len(), compressed.len());
                let header = BlockHeader { last_block: is_last, block_type: BlockType::Compressed, block_size: compressed.len() as u32 };
                self.out_buf.extend_from_slice(&header.encode());
                self.out_buf.extend_from_slice(&compressed);
            }
            None => {
                log::debug!("block of {} bytes not worth compressing, emitting raw", src.len());
                let header = BlockHeader { last_block: is_last, block_type: BlockType::Raw, block_size: src.len() as u32 };
                self.out_buf.extend_from_slice(&header.encode());
                self.out_buf.extend_from_slice(&src);
                if let Some(hasher) = &mut self.ctx.checksum {
                    hasher.update(&src);
                }
            }
        }
        self.emitted_any_block = true;
        if is_last {
            self.emit_final_empty_if_needed();
        }
        Ok(())
    }

    /// Always emits a last-block marker, even for an otherwise-empty frame,
    /// rather than eliding it.
    fn emit_final_empty_if_needed(&mut self) {
        if !self.emitted_any_block {
            let header = BlockHeader { last_block: true, block_type: BlockType::Raw, block_size: 0 };
            self.out_buf.extend_from_slice(&header.encode());
        }
    }

    fn finish_frame(&mut self, output: &mut Vec<u8>) -> Res<()> {
        if !self.emitted_any_block {
            self.compress_one_block(true)?;
            output.extend_from_slice(&self.out_buf[self.out_pos..]);
            self.out_pos = self.out_buf.len();
        }
        if let Some(hasher) = &self.ctx.checksum {
            output.extend_from_slice(&checksum_trailer(hasher));
        }
        Ok(())
    }
}
