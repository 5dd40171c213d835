//! # Streaming PDF Writer
//!
//! Scrive oggetti `lopdf` direttamente su un `Write`, uno alla volta, tenendo in
//! memoria solo gli offset per la tabella xref. Serve all'assembler per
//! liberare i byte delle immagini a ogni batch invece di costruire l'intero
//! `Document` in memoria prima del salvataggio.

use lopdf::{Dictionary, Object};
use std::io::{self, Write};

const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n";

/// Appends numbered objects and closes the file with a classic xref table
pub struct PdfStreamWriter<W: Write> {
    inner: W,
    position: u64,
    offsets: Vec<(u32, u64)>,
}

impl<W: Write> PdfStreamWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(HEADER)?;
        Ok(Self {
            inner,
            position: HEADER.len() as u64,
            offsets: Vec::new(),
        })
    }

    /// Write `id 0 obj ... endobj` for a non-stream object
    pub fn write_object(&mut self, id: u32, object: &Object) -> io::Result<()> {
        let mut buf = Vec::new();
        write!(buf, "{} 0 obj\n", id)?;
        write_value(&mut buf, object)?;
        buf.extend_from_slice(b"\nendobj\n");
        self.begin(id);
        self.emit(&buf)
    }

    /// Write a stream object; `/Length` is set from `content`
    pub fn write_stream(&mut self, id: u32, dict: &Dictionary, content: &[u8]) -> io::Result<()> {
        let mut dict = dict.clone();
        dict.set("Length", content.len() as i64);

        let mut head = Vec::new();
        write!(head, "{} 0 obj\n", id)?;
        write_dictionary(&mut head, &dict)?;
        head.extend_from_slice(b"\nstream\n");

        self.begin(id);
        self.emit(&head)?;
        self.emit(content)?;
        self.emit(b"\nendstream\nendobj\n")
    }

    /// Push buffered output to the underlying writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Write xref table and trailer, returning the underlying writer
    pub fn finish(mut self, root: u32) -> io::Result<W> {
        let xref_start = self.position;
        self.offsets.sort_unstable();
        let size = self.offsets.last().map_or(1, |(id, _)| id + 1);

        let mut tail = Vec::new();
        write!(tail, "xref\n0 {}\n0000000000 65535 f \n", size)?;
        let mut offsets = self.offsets.iter().peekable();
        for id in 1..size {
            match offsets.next_if(|(entry, _)| *entry == id) {
                Some((_, offset)) => write!(tail, "{:010} 00000 n \n", offset)?,
                None => tail.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        write!(
            tail,
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, root, xref_start
        )?;
        self.emit(&tail)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn begin(&mut self, id: u32) {
        self.offsets.push((id, self.position));
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}

fn write_value(out: &mut Vec<u8>, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(value) => write!(out, "{}", value)?,
        Object::Real(value) => write!(out, "{}", value)?,
        Object::Name(name) => write_name(out, name),
        Object::String(text, _) => {
            out.push(b'<');
            for byte in text {
                write!(out, "{:02X}", byte)?;
            }
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b' ');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict)?,
        Object::Stream(_) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "streams must be written with write_stream",
            ))
        }
        Object::Reference((id, generation)) => write!(out, "{} {} R", id, generation)?,
    }
    Ok(())
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) -> io::Result<()> {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_value(out, value)?;
    }
    out.extend_from_slice(b">>");
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        // delimiters and bytes outside `!`..`~` are hex-escaped
        if b" \t\n\r\x0C()<>[]{}/%#".contains(&byte) || !(33..=126).contains(&byte) {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        } else {
            out.push(byte);
        }
    }
}
