//! Code namespace for the signaling gateway (LAPD/Q.931/ISUP/NFAS/translator).
//!
//! Reserved range: systems 8000–8099, subsystems 8100–8199,
//! error codes 9000–9199, user codes 9500–9599.

use crate::GlobalId;

// ── Systems (8000–8099) ───────────────────────────────────────────

pub const SYS_LAPD:      GlobalId = GlobalId::new("lapd", 8001);
pub const SYS_Q931:      GlobalId = GlobalId::new("q931", 8002);
pub const SYS_ISUP:      GlobalId = GlobalId::new("isup", 8003);
pub const SYS_NFAS:      GlobalId = GlobalId::new("nfas", 8004);
pub const SYS_XLAT:      GlobalId = GlobalId::new("xlat", 8005);
pub const SYS_SESSION:   GlobalId = GlobalId::new("session", 8006);
pub const SYS_RTP:       GlobalId = GlobalId::new("rtp", 8007);
pub const SYS_TRANSPORT: GlobalId = GlobalId::new("transport", 8008);

// ── Subsystems (8100–8199) ────────────────────────────────────────

pub const SUB_FRAME_CODEC:   GlobalId = GlobalId::new("frame_codec", 8100);
pub const SUB_LAPD_ENGINE:   GlobalId = GlobalId::new("lapd_engine", 8101);
pub const SUB_Q931_CODEC:    GlobalId = GlobalId::new("q931_codec", 8102);
pub const SUB_CALL_CONTROL:  GlobalId = GlobalId::new("call_control", 8103);
pub const SUB_CIC_POOL:      GlobalId = GlobalId::new("cic_pool", 8104);
pub const SUB_NFAS_GROUP:    GlobalId = GlobalId::new("nfas_group", 8105);
pub const SUB_RULESET:       GlobalId = GlobalId::new("ruleset", 8106);
pub const SUB_REGISTRY:      GlobalId = GlobalId::new("registry", 8107);
pub const SUB_PORT_POOL:     GlobalId = GlobalId::new("port_pool", 8108);

// ── Error codes (9000–9199) ───────────────────────────────────────

pub const ERR_TOO_SHORT:            GlobalId = GlobalId::new("too_short", 9000);
pub const ERR_BAD_ADDRESS:          GlobalId = GlobalId::new("bad_address", 9001);
pub const ERR_BAD_CONTROL:          GlobalId = GlobalId::new("bad_control", 9002);
pub const ERR_BAD_FCS:              GlobalId = GlobalId::new("bad_fcs", 9003);
pub const ERR_ESTABLISHMENT_FAILED: GlobalId = GlobalId::new("establishment_failed", 9010);
pub const ERR_LINK_LOST:            GlobalId = GlobalId::new("link_lost", 9011);
pub const ERR_PEER_REJECTED:        GlobalId = GlobalId::new("peer_rejected", 9012);
pub const ERR_UNKNOWN_MESSAGE_TYPE: GlobalId = GlobalId::new("unknown_message_type", 9020);
pub const ERR_INCOMPATIBLE_STATE:   GlobalId = GlobalId::new("incompatible_state", 9021);
pub const ERR_MANDATORY_IE_MISSING: GlobalId = GlobalId::new("mandatory_ie_missing", 9022);
pub const ERR_CALL_TIMEOUT:         GlobalId = GlobalId::new("call_timeout", 9030);
pub const ERR_GLARE:                GlobalId = GlobalId::new("glare", 9031);
pub const ERR_NO_CHANNEL_AVAILABLE: GlobalId = GlobalId::new("no_channel_available", 9032);
pub const ERR_NO_PORTS_AVAILABLE:   GlobalId = GlobalId::new("no_ports_available", 9040);
pub const ERR_CIC_EXHAUSTED:        GlobalId = GlobalId::new("cic_exhausted", 9041);
pub const ERR_KEY_COLLISION:        GlobalId = GlobalId::new("key_collision", 9042);
pub const ERR_NO_RULE_FOR_CAUSE:    GlobalId = GlobalId::new("no_rule_for_cause", 9050);
pub const ERR_QUEUE_OVERFLOW:       GlobalId = GlobalId::new("queue_overflow", 9051);
pub const ERR_CONFIG:               GlobalId = GlobalId::new("config_error", 9060);
pub const ERR_WINDOW_FULL:          GlobalId = GlobalId::new("window_full", 9070);
pub const ERR_PEER_BUSY:            GlobalId = GlobalId::new("peer_busy", 9071);
pub const ERR_LINK_NOT_UP:          GlobalId = GlobalId::new("link_not_up", 9072);
pub const ERR_BAD_PROTOCOL_DISCRIMINATOR: GlobalId = GlobalId::new("bad_protocol_discriminator", 9080);
pub const ERR_BAD_CALL_REFERENCE_LENGTH:  GlobalId = GlobalId::new("bad_call_reference_length", 9081);
pub const ERR_TRUNCATED_IE:         GlobalId = GlobalId::new("truncated_ie", 9082);
pub const ERR_BAD_CIC:              GlobalId = GlobalId::new("bad_cic", 9083);
pub const ERR_TRUNCATED_PARAMETER:  GlobalId = GlobalId::new("truncated_parameter", 9084);
pub const ERR_NOT_FOUND:            GlobalId = GlobalId::new("not_found", 9090);
pub const ERR_TRANSPORT_UNBOUND:    GlobalId = GlobalId::new("transport_unbound", 9091);

// ── User codes — operation context (9500–9599) ────────────────────

pub const UC_DECODE:     GlobalId = GlobalId::new("decode", 9500);
pub const UC_ENCODE:     GlobalId = GlobalId::new("encode", 9501);
pub const UC_ESTABLISH:  GlobalId = GlobalId::new("establish", 9502);
pub const UC_SEND:       GlobalId = GlobalId::new("send", 9503);
pub const UC_RECV:       GlobalId = GlobalId::new("recv", 9504);
pub const UC_ALLOCATE:   GlobalId = GlobalId::new("allocate", 9505);
pub const UC_RELEASE:    GlobalId = GlobalId::new("release", 9506);
pub const UC_TRANSLATE:  GlobalId = GlobalId::new("translate", 9507);
pub const UC_SWITCHOVER: GlobalId = GlobalId::new("switchover", 9508);
pub const UC_INSERT:     GlobalId = GlobalId::new("insert", 9509);
pub const UC_LOOKUP:     GlobalId = GlobalId::new("lookup", 9510);
pub const UC_CONFIGURE:  GlobalId = GlobalId::new("configure", 9511);
