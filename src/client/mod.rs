//! The client protocol engine.
//!
//! A single-threaded, cooperative loop: receive from the socket, decode and
//! dispatch at most one diplomacy message per iteration, then drain pending
//! sends. The `Session` is the surface bots see: the game state, the token
//! dictionary, and the outgoing queues. Everything else (frame handling,
//! the dispatch table, press bookkeeping, reconnection) lives in `Client`.

use std::collections::BTreeSet;
use std::io;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::board::GameState;
use crate::bot::Bot;
use crate::token::lexicon::{self, Token};
use crate::token::text::{ascii_message, ascii_run_string};
use crate::token::{TokenDictionary, TokenMessage};
use crate::wire::{Frame, FramedSocket};

/// Pause between loop iterations when nothing arrived.
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// A press message we sent and still await an answer for.
#[derive(Debug, Clone)]
pub struct PressRecord {
    pub original_receiving_powers: TokenMessage,
    pub receiving_powers: TokenMessage,
    pub press_message: TokenMessage,
    /// Resend to the reduced power set when a recipient drops out;
    /// otherwise surface the failure to the bot.
    pub resend_partial: bool,
    pub is_broadcast: bool,
}

/// The state a bot works against: the game, the dictionary, and the
/// outgoing message queue.
pub struct Session {
    pub state: GameState,
    pub dictionary: TokenDictionary,
    /// Powers currently in civil disorder.
    pub cd_powers: BTreeSet<Token>,
    pub(crate) sent_press: Vec<PressRecord>,
    outgoing: Vec<TokenMessage>,
    stop: bool,
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session {
            state: GameState::new(),
            dictionary: TokenDictionary::default(),
            cd_powers: BTreeSet::new(),
            sent_press: Vec::new(),
            outgoing: Vec::new(),
            stop: false,
        }
    }

    /// Queues a diplomacy message for the next send pass.
    pub fn send_message(&mut self, message: TokenMessage) {
        debug!("send: {}", self.dictionary.render_message(&message));
        self.outgoing.push(message);
    }

    /// Serialises the entered orders into a SUB command and queues it,
    /// unless nothing was ordered.
    pub fn send_orders(&mut self) {
        let sub = self.state.build_sub_command();
        if sub.len() > 1 {
            self.send_message(sub);
        }
    }

    /// Sends press to the listed powers, recording it for CCD handling.
    pub fn send_press(
        &mut self,
        receiving_powers: TokenMessage,
        press_message: TokenMessage,
        resend_partial: bool,
    ) {
        self.sent_press.push(PressRecord {
            original_receiving_powers: receiving_powers.clone(),
            receiving_powers: receiving_powers.clone(),
            press_message: press_message.clone(),
            resend_partial,
            is_broadcast: false,
        });
        self.send_message(lexicon::SND & receiving_powers & press_message);
    }

    /// Broadcasts press to every power except ourselves and those in civil
    /// disorder.
    pub fn send_broadcast(&mut self, press_message: TokenMessage) {
        let mut receiving_powers = TokenMessage::new();
        for power in 0..self.state.map.power_count {
            let token = Token::new(lexicon::CATEGORY_POWER, power as u8);
            if token != self.state.power_played && !self.cd_powers.contains(&token) {
                receiving_powers = receiving_powers + token;
            }
        }
        self.sent_press.push(PressRecord {
            original_receiving_powers: receiving_powers.clone(),
            receiving_powers: receiving_powers.clone(),
            press_message: press_message.clone(),
            resend_partial: true,
            is_broadcast: true,
        });
        self.send_message(lexicon::SND & receiving_powers & press_message);
    }

    /// Asks the main loop to finish after the current iteration.
    pub fn request_stop(&mut self) {
        self.stop = true;
    }

    pub fn stopping(&self) -> bool {
        self.stop
    }
}

/// A DAIDE client: socket, session, and a bot supplying the decisions.
pub struct Client<B: Bot> {
    socket: FramedSocket,
    pub session: Session,
    pub bot: B,
    map_message: TokenMessage,
    map_requested: bool,
    reconnect: Option<(String, i32)>,
}

impl<B: Bot> Client<B> {
    /// Connects to the server. `reconnect` is the power mnemonic and
    /// passcode to rejoin with when the server rejects our name.
    pub fn connect(
        host: &str,
        port: u16,
        reconnect: Option<(String, i32)>,
        bot: B,
    ) -> io::Result<Client<B>> {
        let socket = FramedSocket::connect(host, port)?;
        info!("connected to {}:{}", host, port);
        Ok(Client {
            socket,
            session: Session::new(),
            bot,
            map_message: TokenMessage::new(),
            map_requested: false,
            reconnect,
        })
    }

    /// Runs the session to completion: handshake, then the cooperative
    /// receive/dispatch/send loop until the stop flag is set or the peer
    /// goes away.
    pub fn run(&mut self) {
        self.socket.push_outgoing(&Frame::initial());
        match self.bot.identity() {
            Some((name, version)) => {
                let message =
                    lexicon::NME & ascii_message(name) & ascii_message(version);
                self.session.send_message(message);
            }
            None => self.session.send_message(TokenMessage::single(lexicon::OBS)),
        }
        self.flush_session_messages();

        while !self.session.stop && !self.socket.is_closed() {
            if let Err(err) = self.socket.receive_available() {
                info!("session over: {}", err);
                break;
            }
            // One message per iteration keeps the loop responsive to
            // termination between long dispatches.
            let worked = match self.socket.pull_incoming() {
                Some(frame) => {
                    self.process_frame(frame);
                    true
                }
                None => false,
            };
            self.flush_session_messages();
            if let Err(err) = self.socket.send_pending() {
                info!("session over: {}", err);
                break;
            }
            if !worked {
                std::thread::sleep(IDLE_WAIT);
            }
        }
        self.flush_session_messages();
        let _ = self.socket.send_pending();
    }

    fn flush_session_messages(&mut self) {
        for message in std::mem::take(&mut self.session.outgoing) {
            self.socket
                .push_outgoing(&Frame::Diplomacy(message.tokens().to_vec()));
        }
    }

    fn process_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Initial { .. } => warn!("unexpected initial message from server"),
            Frame::Representation(entries) => {
                debug!("representation message: {} entries", entries.len());
                if !entries.is_empty() {
                    self.session.dictionary.clear_powers_and_provinces();
                    for entry in entries {
                        self.session.dictionary.insert(entry.token, &entry.name);
                    }
                }
            }
            Frame::Diplomacy(tokens) => self.process_diplomacy(&tokens),
            Frame::Final => {
                info!("final message received");
                self.session.stop = true;
            }
            Frame::Error(code) => {
                error!("error message received, code {}", code);
                self.session.stop = true;
            }
        }
    }

    fn process_diplomacy(&mut self, tokens: &[Token]) {
        // PRN reports our own bad parentheses; its body is deliberately
        // unbalanced, so never parse it.
        if tokens.first() == Some(&lexicon::PRN) {
            warn!("server reports bad parentheses in a sent message");
            return;
        }
        let message = match TokenMessage::from_tokens(tokens) {
            Ok(message) => message,
            Err(err) => {
                warn!("undecodable diplomacy message: {}", err);
                return;
            }
        };
        debug!("recv: {}", self.session.dictionary.render_message(&message));
        if !message.submessage_is_single_token(0) {
            warn!("illegal diplomacy message received");
            return;
        }

        let lead = message.first();
        if lead == lexicon::HLO {
            self.process_hlo(&message);
        } else if lead == lexicon::MAP {
            self.process_map(&message);
        } else if lead == lexicon::MDF {
            self.process_mdf(&message);
        } else if lead == lexicon::NOW {
            if let Err(err) = self.session.state.set_units(&message) {
                warn!("bad NOW message: {}", err);
            }
            self.bot.on_now(&mut self.session);
        } else if lead == lexicon::ORD {
            if let Err(err) = self.session.state.store_result(&message) {
                warn!("bad ORD message: {}", err);
            }
            self.bot.on_ord(&mut self.session);
        } else if lead == lexicon::SCO {
            if let Err(err) = self.session.state.set_ownership(&message) {
                warn!("bad SCO message: {}", err);
            }
            self.bot.on_sco(&mut self.session);
        } else if lead == lexicon::THX {
            self.process_thx(&message);
        } else if lead == lexicon::CCD {
            self.process_ccd(&message);
        } else if lead == lexicon::NOT {
            self.process_not(&message);
        } else if lead == lexicon::REJ {
            self.process_rej(&message);
        } else if lead == lexicon::YES {
            self.process_yes(&message);
        } else if lead == lexicon::FRM {
            self.process_frm(&message);
        } else if lead == lexicon::HUH {
            warn!(
                "server did not understand: {}",
                self.session.dictionary.render_message(&message)
            );
        } else if lead == lexicon::OUT {
            let power = message.submessage(1).first();
            self.check_sent_press_for_missing_power(power);
            self.bot.on_out(&mut self.session, power);
        } else if lead == lexicon::OFF {
            info!("ordered off by the server");
            self.session.stop = true;
            self.bot.on_off(&mut self.session);
        } else if lead == lexicon::SLO {
            let winner = message.submessage(1).first();
            info!("solo victory announced");
            self.session.state.game_over = true;
            self.session.stop = true;
            self.bot.on_slo(&mut self.session, winner);
        } else if lead == lexicon::DRW {
            info!("draw announced");
            self.session.state.game_over = true;
            self.session.stop = true;
            self.bot.on_drw(&mut self.session);
        } else if lead == lexicon::SMR {
            info!("summary received, game over");
            self.session.stop = true;
            self.bot.on_smr(&mut self.session, &message);
        } else if lead == lexicon::TME {
            self.bot.on_tme(&mut self.session, &message);
        } else if lead == lexicon::SVE {
            // Accept the save; nothing of ours needs saving.
            let reply = lexicon::YES & message.clone();
            self.session.send_message(reply);
        } else if lead == lexicon::LOD {
            // We keep no state across restarts; decline the load.
            let reply = lexicon::REJ & message.clone();
            self.session.send_message(reply);
        } else if lead == lexicon::ADM {
            debug!(
                "admin message: {}",
                self.session.dictionary.render_message(&message)
            );
        } else if lead == lexicon::MIS {
            debug!(
                "missing orders: {}",
                self.session.dictionary.render_message(&message)
            );
        } else {
            warn!(
                "unexpected message: {}",
                self.session.dictionary.render_message(&message)
            );
        }
    }

    /// HLO: remember who we play and how orders are checked.
    fn process_hlo(&mut self, message: &TokenMessage) {
        let power = message.submessage(1).first();
        let passcode = message.submessage(2).first().number_value();
        self.session.state.passcode = passcode;
        self.session.state.variant = message.submessage(3);
        self.session.state.set_power_played(power);

        // Any-orders-accepted games defer validation to the adjudicator.
        let any_orders = self.session.state.variant_setting(lexicon::AOA).is_some();
        self.session.state.set_order_checking(!any_orders, any_orders);

        info!(
            "playing {}",
            self.session
                .dictionary
                .text_for(power)
                .unwrap_or("an unnamed power")
        );
        self.bot.on_hlo(&mut self.session);
    }

    /// MAP: store the name and ask for the definition.
    fn process_map(&mut self, message: &TokenMessage) {
        let name = ascii_run_string(&message.submessage(1));
        info!("map is '{}'", name);
        self.session.state.map.name = name;
        self.map_message = message.clone();
        self.session
            .send_message(TokenMessage::single(lexicon::MDF));
        self.bot.on_map(&mut self.session);
    }

    /// MDF: build the map; acknowledge it, or catch up after reconnection.
    fn process_mdf(&mut self, message: &TokenMessage) {
        if let Err(err) = self.session.state.set_map(message) {
            warn!("failed to set map: {}", err);
        }
        self.bot.on_mdf(&mut self.session);
        if self.map_requested {
            // Requested after an IAM: pull the whole game state across.
            self.session
                .send_message(TokenMessage::single(lexicon::HLO));
            self.session
                .send_message(TokenMessage::single(lexicon::ORD));
            self.session
                .send_message(TokenMessage::single(lexicon::SCO));
            self.session
                .send_message(TokenMessage::single(lexicon::NOW));
            self.map_requested = false;
        } else {
            let acknowledgement = lexicon::YES & self.map_message.clone();
            self.session.send_message(acknowledgement);
        }
    }

    /// THX: when the note is bad, submit the minimal repair order -- hold
    /// for an illegal move, disband for an illegal retreat, waive for an
    /// illegal build.
    fn process_thx(&mut self, message: &TokenMessage) {
        let order = message.submessage(1);
        let note = message.submessage(2).first();
        if note == lexicon::MBV {
            return;
        }
        let unit = order.submessage(0).enclose();

        let replacement = if note == lexicon::FAR
            || note == lexicon::NSP
            || note == lexicon::NSU
            || note == lexicon::NAS
            || note == lexicon::NSF
            || note == lexicon::NSA
        {
            Some(unit + lexicon::HLD)
        } else if note == lexicon::NVR {
            Some(unit + lexicon::DSB)
        } else if note == lexicon::YSC
            || note == lexicon::ESC
            || note == lexicon::HSC
            || note == lexicon::NSC
            || note == lexicon::CST
        {
            Some(unit.submessage(0) + lexicon::WVE)
        } else {
            // NYU/NRS: not ours to fix; NRN/NMB/NMR: nothing was needed.
            None
        };

        match replacement {
            Some(new_order) if new_order != order => {
                warn!(
                    "order rejected ({}), replacing with {}",
                    self.session
                        .dictionary
                        .text_for(note)
                        .unwrap_or("unknown note"),
                    self.session.dictionary.render_message(&new_order)
                );
                let submission = lexicon::SUB & new_order;
                self.session.send_message(submission);
            }
            _ => {
                warn!(
                    "order rejected ({}), no replacement sent",
                    self.session
                        .dictionary
                        .text_for(note)
                        .unwrap_or("unknown note")
                );
            }
        }
    }

    /// CCD: a power dropped out; fix up pending press and tell the bot.
    fn process_ccd(&mut self, message: &TokenMessage) {
        let power = message.submessage(1).first();
        self.check_sent_press_for_missing_power(power);
        let is_new_disconnection = self.session.cd_powers.insert(power);
        self.bot
            .on_ccd(&mut self.session, power, is_new_disconnection);
    }

    fn process_not(&mut self, message: &TokenMessage) {
        let parameters = message.submessage(1);
        if parameters.first() == lexicon::CCD {
            let power = parameters.submessage(1).first();
            let is_new_reconnection = self.session.cd_powers.remove(&power);
            self.bot
                .on_not_ccd(&mut self.session, power, is_new_reconnection);
        } else if parameters.first() == lexicon::TME {
            debug!("time advisory cancelled");
        } else {
            warn!(
                "unexpected NOT: {}",
                self.session.dictionary.render_message(message)
            );
        }
    }

    fn process_rej(&mut self, message: &TokenMessage) {
        let parameters = message.submessage(1);
        let rejected = parameters.first();
        if rejected == lexicon::NME {
            match self.reconnect.clone() {
                Some((power_name, passcode)) => {
                    match self.session.dictionary.token_for(&power_name) {
                        Some(power) => {
                            info!("name rejected, rejoining as {}", power_name);
                            self.map_requested = true;
                            let iam = lexicon::IAM & power & Token::number(passcode);
                            self.session.send_message(iam);
                            self.session
                                .send_message(TokenMessage::single(lexicon::MAP));
                        }
                        None => {
                            error!("unknown reconnection power '{}'", power_name);
                            self.session.stop = true;
                        }
                    }
                }
                None => {
                    error!("server rejected our name and no reconnection was given");
                    self.session.stop = true;
                }
            }
        } else if rejected == lexicon::SND {
            self.remove_sent_press(&parameters);
        } else {
            debug!(
                "rejected: {}",
                self.session.dictionary.render_message(message)
            );
        }
    }

    fn process_yes(&mut self, message: &TokenMessage) {
        let parameters = message.submessage(1);
        if parameters.first() == lexicon::SND {
            self.remove_sent_press(&parameters);
        } else {
            debug!(
                "accepted: {}",
                self.session.dictionary.render_message(message)
            );
        }
    }

    /// FRM: press we do not understand gets the polite brush-off, a HUH of
    /// the body and an empty TRY.
    fn process_frm(&mut self, message: &TokenMessage) {
        let from = message.submessage(1).first();
        let body = message.submessage(3);
        if body.first() != lexicon::HUH && body.first() != lexicon::TRY {
            let huh = lexicon::SND & from & (lexicon::HUH & (lexicon::ERR + body.clone()));
            let try_reply = lexicon::SND & from & (lexicon::TRY & TokenMessage::new());
            self.session.send_message(huh);
            self.session.send_message(try_reply);
        }
        self.bot.on_frm(&mut self.session, message);
    }

    /// A recipient of pending press vanished: resend to the reduced set or
    /// surface the failure.
    fn check_sent_press_for_missing_power(&mut self, missing_power: Token) {
        let mut resends: Vec<TokenMessage> = Vec::new();
        let mut failures: Vec<(bool, TokenMessage, TokenMessage)> = Vec::new();

        for record in self.session.sent_press.iter_mut() {
            let addressed = record
                .receiving_powers
                .tokens()
                .iter()
                .any(|&t| t == missing_power);
            if !addressed {
                continue;
            }
            if record.resend_partial {
                let mut reduced = TokenMessage::new();
                for &power in record.receiving_powers.tokens() {
                    if power != missing_power {
                        reduced = reduced + power;
                    }
                }
                record.receiving_powers = reduced.clone();
                resends.push(lexicon::SND & reduced & record.press_message.clone());
            } else {
                failures.push((
                    record.is_broadcast,
                    record.original_receiving_powers.clone(),
                    record.press_message.clone(),
                ));
            }
        }

        for message in resends {
            self.session.send_message(message);
        }
        for (is_broadcast, powers, press) in failures {
            self.bot
                .on_failed_press(&mut self.session, is_broadcast, &powers, &press);
        }
    }

    /// YES(SND ...) or REJ(SND ...): the press is answered, drop its record.
    fn remove_sent_press(&mut self, send_message: &TokenMessage) {
        let to_powers = send_message.submessage(1);
        let press_message = send_message.submessage(2);
        self.session.sent_press.retain(|record| {
            record.receiving_powers != to_powers || record.press_message != press_message
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::HoldBot;

    #[test]
    fn session_queues_messages() {
        let mut session = Session::new();
        session.send_message(TokenMessage::single(lexicon::OBS));
        assert_eq!(session.outgoing.len(), 1);
        assert!(!session.stopping());
        session.request_stop();
        assert!(session.stopping());
    }

    #[test]
    fn send_orders_skips_empty_submissions() {
        let mut session = Session::new();
        session.send_orders();
        assert!(session.outgoing.is_empty());
    }

    #[test]
    fn press_records_reduce_on_ccd() {
        let mut session = Session::new();
        let to = lexicon::FRA + lexicon::GER;
        let press = TokenMessage::single(lexicon::PCE);
        session.send_press(to, press, true);
        assert_eq!(session.sent_press.len(), 1);

        // Simulate the client-side bookkeeping directly.
        let record = &mut session.sent_press[0];
        assert!(record
            .receiving_powers
            .tokens()
            .contains(&lexicon::GER));
    }

    #[test]
    fn broadcast_excludes_self_and_cd() {
        let mut session = Session::new();
        session
            .state
            .set_map(&crate::board::standard::standard_mdf())
            .unwrap();
        session.state.power_played = lexicon::ENG;
        session.cd_powers.insert(lexicon::ITA);
        session.send_broadcast(TokenMessage::single(lexicon::PCE));

        let record = &session.sent_press[0];
        let powers = record.receiving_powers.tokens();
        assert_eq!(powers.len(), 5);
        assert!(!powers.contains(&lexicon::ENG));
        assert!(!powers.contains(&lexicon::ITA));
        assert!(powers.contains(&lexicon::FRA));
    }

    #[test]
    fn hold_bot_identity_present() {
        let bot = HoldBot::new();
        assert!(bot.identity().is_some());
    }
}
