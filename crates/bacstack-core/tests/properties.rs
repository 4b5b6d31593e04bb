use bacstack_core::apdu::{
    AbortPdu, Apdu, ComplexAck, ConfirmedRequest, ErrorPdu, RejectPdu, SegmentAck, SegmentHeader,
    SimpleAck, UnconfirmedRequest,
};
use bacstack_core::npdu::{Npdu, NpduAddress};
use bacstack_core::types::{
    BitString, DataValue, Date, MaxApdu, MaxSegments, ObjectId, ObjectType, Time,
};
use bacstack_core::{
    decode_apdu, decode_npdu, decode_tag, encode_apdu, encode_npdu, encode_tag, DecodeError,
    TaggedValue,
};
use proptest::prelude::*;

fn finite_f32() -> impl Strategy<Value = f32> {
    any::<f32>().prop_filter("finite", |v| v.is_finite())
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |v| v.is_finite())
}

fn bit_string() -> impl Strategy<Value = BitString> {
    prop::collection::vec(any::<bool>(), 0..40).prop_map(|bits| BitString::from_bits(&bits))
}

fn data_value() -> impl Strategy<Value = DataValue> {
    prop_oneof![
        Just(DataValue::Null),
        any::<bool>().prop_map(DataValue::Boolean),
        any::<u32>().prop_map(DataValue::Unsigned),
        any::<i32>().prop_map(DataValue::Signed),
        finite_f32().prop_map(DataValue::Real),
        finite_f64().prop_map(DataValue::Double),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(DataValue::OctetString),
        ".{0,40}".prop_map(DataValue::CharacterString),
        bit_string().prop_map(DataValue::BitString),
        any::<u32>().prop_map(DataValue::Enumerated),
        any::<[u8; 4]>().prop_map(|b| DataValue::Date(Date::from_bytes(b))),
        any::<[u8; 4]>().prop_map(|b| DataValue::Time(Time::from_bytes(b))),
        (0u16..1024, 0u32..(1 << 22)).prop_map(|(t, i)| {
            DataValue::ObjectId(ObjectId::new(ObjectType::from_u16(t), i))
        }),
    ]
}

fn tagged_value() -> impl Strategy<Value = TaggedValue> {
    let leaf = prop_oneof![
        data_value().prop_map(TaggedValue::Application),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..20))
            .prop_map(|(tag_num, data)| TaggedValue::Context { tag_num, data }),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        (any::<u8>(), prop::collection::vec(inner, 0..4))
            .prop_map(|(tag_num, values)| TaggedValue::Constructed { tag_num, values })
    })
}

fn segment() -> impl Strategy<Value = Option<SegmentHeader>> {
    prop::option::of((any::<u8>(), 1u8..=127, any::<bool>()).prop_map(
        |(sequence_number, window_size, more_follows)| SegmentHeader {
            sequence_number,
            window_size,
            more_follows,
        },
    ))
}

fn service_data() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

fn apdu() -> impl Strategy<Value = Apdu> {
    prop_oneof![
        (
            any::<bool>(),
            0u8..8,
            0u8..6,
            any::<u8>(),
            segment(),
            any::<u8>(),
            service_data()
        )
            .prop_map(|(sa, segs, max, invoke_id, segment, service_choice, data)| {
                Apdu::ConfirmedRequest(ConfirmedRequest {
                    segmented_response_accepted: sa,
                    max_segments: MaxSegments::from_u8(segs).unwrap(),
                    max_apdu: MaxApdu::from_u8(max).unwrap(),
                    invoke_id,
                    segment,
                    service_choice,
                    service_data: data,
                })
            }),
        (any::<u8>(), service_data())
            .prop_map(|(c, d)| Apdu::UnconfirmedRequest(UnconfirmedRequest::new(c, d))),
        (any::<u8>(), any::<u8>()).prop_map(|(invoke_id, service_choice)| {
            Apdu::SimpleAck(SimpleAck {
                invoke_id,
                service_choice,
            })
        }),
        (any::<u8>(), segment(), any::<u8>(), service_data()).prop_map(
            |(invoke_id, segment, service_choice, service_data)| {
                Apdu::ComplexAck(ComplexAck {
                    invoke_id,
                    segment,
                    service_choice,
                    service_data,
                })
            }
        ),
        (any::<bool>(), any::<bool>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
            |(negative, server, invoke_id, sequence_number, actual_window_size)| {
                Apdu::SegmentAck(SegmentAck {
                    negative,
                    server,
                    invoke_id,
                    sequence_number,
                    actual_window_size,
                })
            }
        ),
        (any::<u8>(), any::<u8>(), any::<u32>(), any::<u32>()).prop_map(
            |(invoke_id, service_choice, error_class, error_code)| {
                Apdu::Error(ErrorPdu {
                    invoke_id,
                    service_choice,
                    error_class,
                    error_code,
                })
            }
        ),
        (any::<u8>(), any::<u8>())
            .prop_map(|(invoke_id, reason)| Apdu::Reject(RejectPdu { invoke_id, reason })),
        (any::<bool>(), any::<u8>(), any::<u8>()).prop_map(|(server, invoke_id, reason)| {
            Apdu::Abort(AbortPdu {
                server,
                invoke_id,
                reason,
            })
        }),
    ]
}

proptest! {
    #[test]
    fn tagged_value_roundtrip(v in tagged_value()) {
        let bytes = encode_tag(&v).unwrap();
        let (decoded, next) = decode_tag(&bytes, 0).unwrap();
        prop_assert_eq!(decoded, v);
        prop_assert_eq!(next, bytes.len());
    }

    #[test]
    fn tagged_value_prefix_is_truncated(v in tagged_value(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_tag(&v).unwrap();
        let len = cut.index(bytes.len());
        match decode_tag(&bytes[..len], 0) {
            Err(DecodeError::TruncatedInput { offset }) => prop_assert!(offset <= len),
            other => prop_assert!(false, "prefix {len} of {} gave {other:?}", bytes.len()),
        }
    }

    #[test]
    fn apdu_roundtrip(a in apdu()) {
        let bytes = encode_apdu(&a).unwrap();
        prop_assert_eq!(decode_apdu(&bytes).unwrap(), a);
    }

    #[test]
    fn apdu_prefix_decodes_or_truncates(a in apdu(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_apdu(&a).unwrap();
        let len = cut.index(bytes.len() + 1);
        match decode_apdu(&bytes[..len]) {
            Ok(_) | Err(DecodeError::TruncatedInput { .. }) => {}
            Err(e) => prop_assert!(false, "prefix {len} gave {e:?}"),
        }
    }

    #[test]
    fn npdu_roundtrip(
        expecting_reply in any::<bool>(),
        priority in 0u8..4,
        dest in prop::option::of((any::<u16>(), prop::collection::vec(any::<u8>(), 0..7))),
        src in prop::option::of((any::<u16>(), prop::collection::vec(any::<u8>(), 1..7))),
        payload in service_data(),
    ) {
        let mut npdu = Npdu::new(payload).with_expecting_reply(expecting_reply);
        npdu.priority = priority;
        if let Some((net, mac)) = dest {
            npdu = npdu.with_destination(NpduAddress::new(net, mac));
        }
        if let Some((net, mac)) = src {
            npdu = npdu.with_source(NpduAddress::new(net, mac));
        }
        let bytes = encode_npdu(&npdu).unwrap();
        prop_assert_eq!(decode_npdu(&bytes).unwrap(), npdu);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = decode_npdu(&bytes);
        let _ = decode_apdu(&bytes);
        let _ = decode_tag(&bytes, 0);
    }
}
