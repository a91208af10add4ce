mod setup;

use std::thread;

use xconn::message::{self, Message};
use xconn::{Anonymous, Connection, Dict, Invoke, ProcedureHandler, SerializerType};

use setup::MockRouter;

/// End-to-end join (rawsocket handshake + HELLO/WELCOME), register, call,
/// unregister, and graceful leave, against a hand-driven mock router —
/// the scenario in spec §8's "Register / call / unregister" and
/// "Ticket-auth call sum" writeups, run anonymously since no live router is
/// reachable from this environment.
#[test]
fn join_register_call_unregister_leave() {
    let router = MockRouter::bind("register-call-unregister");
    let url = router.url();

    let router_thread = thread::spawn(move || {
        let base = router.accept(SerializerType::Json);

        match base.recv_message().unwrap().unwrap() {
            Message::Hello(realm, _details) => assert_eq!(realm, "realm1"),
            other => panic!("unexpected message: {:?}", other),
        }
        base.send_message(&Message::Welcome(1, Dict::new())).unwrap();

        let registration_id = 101;
        match base.recv_message().unwrap().unwrap() {
            Message::Register(request_id, _options, procedure) => {
                assert_eq!(procedure, "io.xconn.sum");
                base.send_message(&Message::Registered(request_id, registration_id))
                    .unwrap();
            }
            other => panic!("unexpected message: {:?}", other),
        }

        match base.recv_message().unwrap().unwrap() {
            Message::Call(request_id, _options, procedure, args, _kwargs) => {
                assert_eq!(procedure, "io.xconn.sum");
                base.send_message(&Message::Invocation(
                    9001,
                    registration_id,
                    Dict::new(),
                    args,
                    None,
                ))
                .unwrap();
                match base.recv_message().unwrap().unwrap() {
                    Message::Yield(yield_request_id, _options, yield_args, _kwargs) => {
                        assert_eq!(yield_request_id, 9001);
                        base.send_message(&Message::Result(request_id, Dict::new(), yield_args, None))
                            .unwrap();
                    }
                    other => panic!("unexpected message: {:?}", other),
                }
            }
            other => panic!("unexpected message: {:?}", other),
        }

        match base.recv_message().unwrap().unwrap() {
            Message::Unregister(request_id, reg_id) => {
                assert_eq!(reg_id, registration_id);
                base.send_message(&Message::Unregistered(request_id)).unwrap();
            }
            other => panic!("unexpected message: {:?}", other),
        }

        match base.recv_message().unwrap().unwrap() {
            Message::Call(request_id, ..) => {
                base.send_message(&Message::Error(
                    message::CALL,
                    request_id,
                    Dict::new(),
                    "wamp.error.no_such_procedure".to_string(),
                    None,
                    None,
                ))
                .unwrap();
            }
            other => panic!("unexpected message: {:?}", other),
        }

        match base.recv_message().unwrap().unwrap() {
            Message::Goodbye(_details, reason) => {
                assert_eq!(reason, "wamp.close.close_realm");
                base.send_message(&Message::Goodbye(Dict::new(), "wamp.close.goodbye_and_out".to_string()))
                    .unwrap();
            }
            other => panic!("unexpected message: {:?}", other),
        }
    });

    let session = Connection::new(url, "realm1")
        .connect_with(Box::new(Anonymous::new("alice")), SerializerType::Json)
        .expect("join should succeed");
    assert_eq!(session.session_id(), 1);

    let handler: ProcedureHandler = std::sync::Arc::new(|args, _kwargs| {
        let sum = args[0].as_i64().unwrap() + args[1].as_i64().unwrap();
        Invoke::Result(vec![sum.into()], Dict::new())
    });
    let registration = session.register("io.xconn.sum", handler).send().unwrap();

    let result = session.call("io.xconn.sum").arg(10i64).arg(5i64).send().unwrap();
    assert_eq!(result.args[0].as_i64(), Some(15));

    session.unregister(registration.registration_id).unwrap();

    let err = session.call("io.xconn.sum").send().unwrap_err();
    match err.kind {
        xconn::ErrorKind::Application { uri, .. } => assert_eq!(uri, "wamp.error.no_such_procedure"),
        other => panic!("expected ApplicationError, got {:?}", other),
    }

    session.leave().unwrap();
    assert!(!session.is_connected());

    router_thread.join().unwrap();
}
