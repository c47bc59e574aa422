/*!
 The low-level event-stream reader: header parsing, the generic integer/float encodings,
 shared-string handling, and the primitives ([`EventReader`]'s methods) that the unarchiver
 composes into the object-construction protocol.
*/

use crate::error::{invalid, TypedStreamError};

const TAG_INTEGER_2: i8 = -127;
const TAG_INTEGER_4: i8 = -126;
const TAG_FLOATING_POINT: i8 = -125;
const TAG_NEW: i8 = -124;
const TAG_NIL: i8 = -123;
const TAG_END_OF_OBJECT: i8 = -122;
const FIRST_TAG: i8 = -128;
const LAST_TAG: i8 = -111;
/// One past the last reserved tag; the bias subtracted from a wire reference number to
/// recover a zero-based table index.
const FIRST_REFERENCE_NUMBER: i64 = LAST_TAG as i64 + 1;

const STREAMER_VERSION_OLD_NEXTSTEP: u8 = 3;
const STREAMER_VERSION_CURRENT: u8 = 4;
const SIGNATURE_BIG_ENDIAN: &[u8] = b"typedstream";
const SIGNATURE_LITTLE_ENDIAN: &[u8] = b"streamtyped";

/// A single parsed event from the underlying byte stream, in the order they occur on the
/// wire. This is the "language-neutral library surface" event vocabulary from the format
/// specification; [`EventReader::read_all_events`] materializes the full sequence for a
/// stream, and the individual `read_*` methods on [`EventReader`] are what the unarchiver
/// actually drives during normal decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Nil,
    /// Unshared raw bytes (`+`).
    UnsharedBytes(Vec<u8>),
    /// A shared string under encoding `%` (atom) or `:` (selector); carries the encoding
    /// byte so that `Event`-level consumers can distinguish the two.
    SharedString { encoding: u8, value: Vec<u8> },
    CString(Vec<u8>),
    /// A reference to a previously stored C string, class, or object.
    Reference { kind: crate::error::ReferenceKind, index: usize },
    SingleClass { name: String, version: i32 },
    BeginObject,
    EndObject,
    ByteArray(Vec<u8>),
    BeginArray { element_encoding: Vec<u8>, length: usize },
    EndArray,
    BeginStruct { name: Option<String>, field_encodings: Vec<Vec<u8>> },
    EndStruct,
    BeginTypedValues(Vec<Vec<u8>>),
    EndTypedValues,
}

/// Outcome of reading a C string value.
#[derive(Debug)]
pub enum CStringRead {
    Nil,
    Literal(Vec<u8>),
    Reference(usize),
}

/// A literally-stored class in a superclass chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleClassRead {
    pub name: String,
    pub version: i32,
}

/// How a class chain terminates.
#[derive(Debug)]
pub enum ClassChainEnd {
    Nil,
    Reference(usize),
}

/// Outcome of reading the head of a literal-or-reference object.
#[derive(Debug)]
pub enum ObjectHead {
    Nil,
    /// A literal object follows: its class chain, then typed-value groups, then `EndObject`.
    New,
    Reference(usize),
}

/// Parsed stream header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub streamer_version: u8,
    pub big_endian: bool,
    pub system_version: u64,
}

/// Reads typedstream data from a borrowed byte slice.
///
/// The reader owns the shared-string table and a single byte cursor; it never buffers more
/// than the underlying slice itself, and holds at most one head byte of lookahead at a time
/// (passed explicitly between methods rather than stored, mirroring the reference reader
/// this crate is modeled on).
pub struct EventReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    pub header: Header,
    shared_strings: Vec<Vec<u8>>,
}

impl<'a> EventReader<'a> {
    /// Constructs a reader over `bytes`, eagerly parsing the header.
    pub fn new(bytes: &'a [u8]) -> Result<Self, TypedStreamError> {
        let mut reader = Self {
            bytes,
            pos: 0,
            header: Header {
                streamer_version: 0,
                big_endian: false,
                system_version: 0,
            },
            shared_strings: Vec::new(),
        };
        reader.header = reader.read_header()?;
        Ok(reader)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the stream has no more bytes available at all (a clean place to stop).
    pub fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], TypedStreamError> {
        if self.pos + n > self.bytes.len() {
            return Err(TypedStreamError::OutOfBounds {
                at: self.pos,
                what: "raw bytes",
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_head(&mut self, head: Option<i8>) -> Result<i8, TypedStreamError> {
        match head {
            Some(h) => Ok(h),
            None => Ok(self.read_exact(1)?[0] as i8),
        }
    }

    fn decode_reference_index(&self, encoded: i64) -> Result<usize, TypedStreamError> {
        let index = encoded - FIRST_REFERENCE_NUMBER;
        if index < 0 {
            return Err(invalid(self.pos, "reference number decodes to a negative index"));
        }
        Ok(index as usize)
    }

    /// The generic integer encoding shared by every numeric field, string length, and
    /// reference number in the format: a literal byte, or a tag selecting a 2- or 4-byte
    /// follow-on value in the stream's byte order.
    fn read_integer(&mut self, head: Option<i8>, signed: bool) -> Result<i64, TypedStreamError> {
        let h = self.read_head(head)?;
        if !(FIRST_TAG..=LAST_TAG).contains(&h) {
            return Ok(if signed { h as i64 } else { (h as u8) as i64 });
        }
        match h {
            TAG_INTEGER_2 => {
                let bytes = self.read_exact(2)?;
                let raw: [u8; 2] = bytes.try_into().unwrap();
                Ok(if self.header.big_endian {
                    if signed {
                        i16::from_be_bytes(raw) as i64
                    } else {
                        u16::from_be_bytes(raw) as i64
                    }
                } else if signed {
                    i16::from_le_bytes(raw) as i64
                } else {
                    u16::from_le_bytes(raw) as i64
                })
            }
            TAG_INTEGER_4 => {
                let bytes = self.read_exact(4)?;
                let raw: [u8; 4] = bytes.try_into().unwrap();
                Ok(if self.header.big_endian {
                    if signed {
                        i32::from_be_bytes(raw) as i64
                    } else {
                        u32::from_be_bytes(raw) as i64
                    }
                } else if signed {
                    i32::from_le_bytes(raw) as i64
                } else {
                    u32::from_le_bytes(raw) as i64
                })
            }
            _ => Err(invalid(self.pos, format!("invalid tag {h} in integer context"))),
        }
    }

    pub fn read_signed_int(&mut self, head: Option<i8>) -> Result<i64, TypedStreamError> {
        self.read_integer(head, true)
    }

    pub fn read_unsigned_int(&mut self, head: Option<i8>) -> Result<u64, TypedStreamError> {
        self.read_integer(head, false).map(|v| v as u64)
    }

    pub fn read_float(&mut self, head: Option<i8>) -> Result<f32, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_FLOATING_POINT {
            let bytes: [u8; 4] = self.read_exact(4)?.try_into().unwrap();
            Ok(if self.header.big_endian {
                f32::from_be_bytes(bytes)
            } else {
                f32::from_le_bytes(bytes)
            })
        } else {
            Ok(self.read_integer(Some(h), true)? as f32)
        }
    }

    pub fn read_double(&mut self, head: Option<i8>) -> Result<f64, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_FLOATING_POINT {
            let bytes: [u8; 8] = self.read_exact(8)?.try_into().unwrap();
            Ok(if self.header.big_endian {
                f64::from_be_bytes(bytes)
            } else {
                f64::from_le_bytes(bytes)
            })
        } else {
            Ok(self.read_integer(Some(h), true)? as f64)
        }
    }

    /// Reads `n` raw bytes verbatim (a byte array's contents).
    pub fn read_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>, TypedStreamError> {
        Ok(self.read_exact(n)?.to_vec())
    }

    /// Reads one literal byte (`c`/`C` fields, which are never tag-encoded).
    pub fn read_literal_byte(&mut self) -> Result<u8, TypedStreamError> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, TypedStreamError> {
        let byte = self.read_exact(1)?[0];
        match byte {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(invalid(self.pos - 1, format!("boolean value {other} is not 0 or 1"))),
        }
    }

    pub fn read_unshared_string(&mut self, head: Option<i8>) -> Result<Option<Vec<u8>>, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_NIL {
            return Ok(None);
        }
        let len = self.read_integer(Some(h), false)? as usize;
        Ok(Some(self.read_exact(len)?.to_vec()))
    }

    pub fn read_shared_string(&mut self, head: Option<i8>) -> Result<Option<Vec<u8>>, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_NIL {
            return Ok(None);
        }
        if h == TAG_NEW {
            let string = self
                .read_unshared_string(None)?
                .ok_or_else(|| invalid(self.pos, "literal shared string cannot be nil"))?;
            self.shared_strings.push(string.clone());
            return Ok(Some(string));
        }
        let reference_number = self.read_integer(Some(h), true)?;
        let index = self.decode_reference_index(reference_number)?;
        self.shared_strings
            .get(index)
            .cloned()
            .map(Some)
            .ok_or_else(|| invalid(self.pos, format!("shared string reference {index} out of range")))
    }

    pub fn read_c_string(&mut self, head: Option<i8>) -> Result<CStringRead, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_NIL {
            return Ok(CStringRead::Nil);
        }
        if h == TAG_NEW {
            let string = self
                .read_shared_string(None)?
                .ok_or_else(|| invalid(self.pos, "literal C string cannot be nil"))?;
            if string.contains(&0) {
                return Err(invalid(self.pos, "C string cannot contain a zero byte"));
            }
            return Ok(CStringRead::Literal(string));
        }
        let reference_number = self.read_integer(Some(h), true)?;
        Ok(CStringRead::Reference(self.decode_reference_index(reference_number)?))
    }

    /// Reads a superclass chain: zero or more literal `SingleClass` entries (child first),
    /// terminated by `nil` or a reference to a previously-stored class.
    pub fn read_class_chain(
        &mut self,
        head: Option<i8>,
    ) -> Result<(Vec<SingleClassRead>, ClassChainEnd), TypedStreamError> {
        let mut h = self.read_head(head)?;
        let mut classes = Vec::new();
        while h == TAG_NEW {
            let name = self
                .read_shared_string(None)?
                .ok_or_else(|| invalid(self.pos, "class name cannot be nil"))?;
            if name.is_empty() {
                return Err(invalid(self.pos, "class name cannot be empty"));
            }
            let version = self.read_integer(None, true)?;
            classes.push(SingleClassRead {
                name: String::from_utf8(name)?,
                version: version as i32,
            });
            h = self.read_head(None)?;
        }
        let end = if h == TAG_NIL {
            ClassChainEnd::Nil
        } else {
            let reference_number = self.read_integer(Some(h), true)?;
            ClassChainEnd::Reference(self.decode_reference_index(reference_number)?)
        };
        Ok((classes, end))
    }

    /// Reads the head of an object: `nil`, the start of a literal object (class chain and
    /// contents follow separately), or a reference.
    pub fn read_object_head(&mut self, head: Option<i8>) -> Result<ObjectHead, TypedStreamError> {
        let h = self.read_head(head)?;
        if h == TAG_NIL {
            return Ok(ObjectHead::Nil);
        }
        if h == TAG_NEW {
            return Ok(ObjectHead::New);
        }
        let reference_number = self.read_integer(Some(h), true)?;
        Ok(ObjectHead::Reference(self.decode_reference_index(reference_number)?))
    }

    /// Reads one fresh head byte for the caller to use in deciding whether an object's
    /// trailing-data loop has reached `EndObject` yet.
    pub fn read_head_byte(&mut self) -> Result<i8, TypedStreamError> {
        self.read_head(None)
    }

    pub fn is_end_of_object(head: i8) -> bool {
        head == TAG_END_OF_OBJECT
    }

    /// Reads the shared-string type-encoding header of a typed-value group (reusing `head`
    /// if one was already consumed) and splits it into its component encodings.
    pub fn read_typed_values_header(&mut self, head: Option<i8>) -> Result<Vec<Vec<u8>>, TypedStreamError> {
        let encoding_string = self
            .read_shared_string(head)?
            .ok_or_else(|| invalid(self.pos, "type encoding string cannot be nil"))?;
        if encoding_string.is_empty() {
            return Err(invalid(self.pos, "type encoding string cannot be empty"));
        }
        Ok(crate::encoding::split(&encoding_string)
            .into_iter()
            .map(|e| e.to_vec())
            .collect())
    }

    fn read_header(&mut self) -> Result<Header, TypedStreamError> {
        let prefix = self.read_exact(2)?;
        let (streamer_version, signature_length) = (prefix[0], prefix[1]);
        if !(STREAMER_VERSION_OLD_NEXTSTEP..=STREAMER_VERSION_CURRENT).contains(&streamer_version) {
            return Err(invalid(0, format!("invalid streamer version {streamer_version}")));
        }
        if streamer_version == STREAMER_VERSION_OLD_NEXTSTEP {
            return Err(invalid(0, "old NeXTSTEP streamer version (3) is not supported"));
        }
        if signature_length as usize != SIGNATURE_BIG_ENDIAN.len() {
            return Err(invalid(
                1,
                format!("signature must be {} bytes long", SIGNATURE_BIG_ENDIAN.len()),
            ));
        }
        let signature = self.read_exact(signature_length as usize)?;
        let big_endian = if signature == SIGNATURE_BIG_ENDIAN {
            true
        } else if signature == SIGNATURE_LITTLE_ENDIAN {
            false
        } else {
            return Err(invalid(2, "unrecognized typedstream signature"));
        };
        // system_version is read using the not-yet-fully-initialized byte order; set it
        // before decoding so read_integer sees the right endianness.
        self.header = Header {
            streamer_version,
            big_endian,
            system_version: 0,
        };
        let system_version = self.read_unsigned_int(None)?;
        Ok(Header {
            streamer_version,
            big_endian,
            system_version,
        })
    }

    /// Reads one full top-level typed-value group's worth of events, or `None` on a clean
    /// end-of-stream (no bytes left at a group boundary).
    pub fn read_all_events(&mut self) -> Result<Vec<Event>, TypedStreamError> {
        let mut events = Vec::new();
        while let Some(group) = self.read_group_events()? {
            events.extend(group);
        }
        Ok(events)
    }

    fn read_group_events(&mut self) -> Result<Option<Vec<Event>>, TypedStreamError> {
        if self.at_eof() {
            return Ok(None);
        }
        let head = self.read_head_byte()?;
        let encodings = self.read_typed_values_header(Some(head))?;
        let mut events = vec![Event::BeginTypedValues(encodings.clone())];
        for encoding in &encodings {
            self.read_value_events(encoding, &mut events)?;
        }
        events.push(Event::EndTypedValues);
        Ok(Some(events))
    }

    fn read_value_events(&mut self, encoding: &[u8], out: &mut Vec<Event>) -> Result<(), TypedStreamError> {
        match encoding {
            b"B" => out.push(Event::Bool(self.read_bool()?)),
            b"C" => out.push(Event::UnsignedInt(self.read_exact(1)?[0] as u64)),
            b"c" => out.push(Event::SignedInt(self.read_exact(1)?[0] as i8 as i64)),
            b"S" | b"I" | b"L" | b"Q" => out.push(Event::UnsignedInt(self.read_unsigned_int(None)?)),
            b"s" | b"i" | b"l" | b"q" => out.push(Event::SignedInt(self.read_signed_int(None)?)),
            b"f" => out.push(Event::Float(self.read_float(None)?)),
            b"d" => out.push(Event::Double(self.read_double(None)?)),
            b"*" => match self.read_c_string(None)? {
                CStringRead::Nil => out.push(Event::Nil),
                CStringRead::Literal(bytes) => out.push(Event::CString(bytes)),
                CStringRead::Reference(index) => out.push(Event::Reference {
                    kind: crate::error::ReferenceKind::CString,
                    index,
                }),
            },
            b"%" => match self.read_shared_string(None)? {
                Some(value) => out.push(Event::SharedString { encoding: b'%', value }),
                None => out.push(Event::Nil),
            },
            b":" => match self.read_shared_string(None)? {
                Some(value) => out.push(Event::SharedString { encoding: b':', value }),
                None => out.push(Event::Nil),
            },
            b"+" => match self.read_unshared_string(None)? {
                Some(bytes) => out.push(Event::UnsharedBytes(bytes)),
                None => out.push(Event::Nil),
            },
            b"#" => {
                let (classes, end) = self.read_class_chain(None)?;
                for class in classes {
                    out.push(Event::SingleClass {
                        name: class.name,
                        version: class.version,
                    });
                }
                match end {
                    ClassChainEnd::Nil => out.push(Event::Nil),
                    ClassChainEnd::Reference(index) => out.push(Event::Reference {
                        kind: crate::error::ReferenceKind::Class,
                        index,
                    }),
                }
            }
            b"@" => match self.read_object_head(None)? {
                ObjectHead::Nil => out.push(Event::Nil),
                ObjectHead::Reference(index) => out.push(Event::Reference {
                    kind: crate::error::ReferenceKind::Object,
                    index,
                }),
                ObjectHead::New => {
                    out.push(Event::BeginObject);
                    let (classes, end) = self.read_class_chain(None)?;
                    for class in classes {
                        out.push(Event::SingleClass {
                            name: class.name,
                            version: class.version,
                        });
                    }
                    match end {
                        ClassChainEnd::Nil => out.push(Event::Nil),
                        ClassChainEnd::Reference(index) => out.push(Event::Reference {
                            kind: crate::error::ReferenceKind::Class,
                            index,
                        }),
                    }
                    loop {
                        let next_head = self.read_head_byte()?;
                        if Self::is_end_of_object(next_head) {
                            break;
                        }
                        let encodings = self.read_typed_values_header(Some(next_head))?;
                        out.push(Event::BeginTypedValues(encodings.clone()));
                        for encoding in &encodings {
                            self.read_value_events(encoding, out)?;
                        }
                        out.push(Event::EndTypedValues);
                    }
                    out.push(Event::EndObject);
                }
            },
            // Consumes no bytes, but still emits a placeholder so event consumers see one
            // event per encoding in the group, matching the count `decode_any_untyped`
            // produces for `!` fields.
            b"!" => out.push(Event::Nil),
            _ if encoding.first() == Some(&b'[') => {
                let (length, element_encoding) = crate::encoding::parse_array(encoding)?;
                if element_encoding == b"c" || element_encoding == b"C" {
                    out.push(Event::ByteArray(self.read_exact(length)?.to_vec()));
                } else {
                    out.push(Event::BeginArray {
                        element_encoding: element_encoding.to_vec(),
                        length,
                    });
                    for _ in 0..length {
                        self.read_value_events(element_encoding, out)?;
                    }
                    out.push(Event::EndArray);
                }
            }
            _ if encoding.first() == Some(&b'{') => {
                let (name, fields) = crate::encoding::parse_struct(encoding)?;
                out.push(Event::BeginStruct {
                    name: name.map(|n| String::from_utf8_lossy(n).into_owned()),
                    field_encodings: fields.iter().map(|f| f.to_vec()).collect(),
                });
                for field in &fields {
                    self.read_value_events(field, out)?;
                }
                out.push(Event::EndStruct);
            }
            other => {
                return Err(invalid(
                    self.pos,
                    format!("don't know how to read a value with encoding {:?}", String::from_utf8_lossy(other)),
                ))
            }
        }
        Ok(())
    }
}
